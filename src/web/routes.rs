// src/web/routes.rs
use crate::{
    state::AppState,
    web::{
        auth_handlers, cron_handlers, health_handlers, mw_auth, portfolio_handlers, public_handlers,
        subscription_handlers, tracker_handlers, webhook_handlers,
    },
};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

pub fn create_router(app_state: AppState) -> Router {
    // --- Rotas Públicas ---
    let public_routes = Router::new()
        .route("/api/health", get(health_handlers::health))
        .route("/api/auth/register", post(auth_handlers::register_user))
        .route("/api/auth/login", post(auth_handlers::login_user))
        .route("/api/auth/logout", post(auth_handlers::logout))
        .route("/api/tracker/auth/register", post(auth_handlers::register_instructor))
        .route("/api/tracker/auth/login", post(auth_handlers::login_instructor))
        .route("/api/tracker/auth/logout", post(auth_handlers::logout))
        .route("/api/templates", get(portfolio_handlers::list_templates))
        .route("/api/public/portfolios/{id}", get(public_handlers::get_public_portfolio))
        .route("/api/public/portfolios/{id}/access", get(public_handlers::get_access))
        .route(
            "/api/public/portfolios/{id}/verify-password",
            post(public_handlers::verify_password),
        )
        .route("/p/{id}", get(public_handlers::show_portfolio_page))
        .route("/p/{id}/unlock", post(public_handlers::unlock_portfolio_page))
        // Autenticados por assinatura / bearer, não por sessão
        .route("/api/stripe/webhook", post(webhook_handlers::stripe_webhook))
        .route("/api/cron/trial-reminders", post(cron_handlers::trial_reminders))
        .route("/api/cron/event-followups", post(cron_handlers::event_followups));

    // --- Kifolio: exigem pai/mãe autenticado ---
    let parent_routes = Router::new()
        .route("/api/auth/me", get(auth_handlers::current_user))
        .route(
            "/api/portfolios",
            get(portfolio_handlers::list_portfolios).post(portfolio_handlers::create_portfolio),
        )
        .route(
            "/api/portfolios/{id}",
            get(portfolio_handlers::get_portfolio)
                .put(portfolio_handlers::update_portfolio)
                .delete(portfolio_handlers::delete_portfolio),
        )
        .route(
            "/api/portfolios/{id}/highlights",
            get(portfolio_handlers::list_highlights).post(portfolio_handlers::create_highlight),
        )
        .route(
            "/api/highlights/{id}",
            put(portfolio_handlers::update_highlight).delete(portfolio_handlers::delete_highlight),
        )
        .route("/api/portfolios/{id}/invitations", post(portfolio_handlers::create_invitation))
        .route(
            "/api/email-preferences",
            get(portfolio_handlers::get_email_preferences).put(portfolio_handlers::update_email_preferences),
        )
        .route("/api/subscription", get(subscription_handlers::get_subscription))
        .route("/api/subscription/start-trial", post(subscription_handlers::start_trial))
        .route("/api/subscription/features/{feature}", get(subscription_handlers::check_feature))
        .route_layer(middleware::from_fn(mw_auth::require_user));

    // --- Tracker: exigem instrutor autenticado ---
    let tracker_routes = Router::new()
        .route("/api/tracker/auth/me", get(auth_handlers::current_instructor))
        .route(
            "/api/tracker/programs",
            get(tracker_handlers::list_programs).post(tracker_handlers::create_program),
        )
        .route(
            "/api/tracker/programs/{id}",
            get(tracker_handlers::get_program)
                .put(tracker_handlers::update_program)
                .delete(tracker_handlers::delete_program),
        )
        .route(
            "/api/tracker/programs/{id}/sessions",
            get(tracker_handlers::list_sessions).post(tracker_handlers::create_session),
        )
        .route(
            "/api/tracker/programs/{id}/students",
            get(tracker_handlers::list_program_students).post(tracker_handlers::create_student),
        )
        .route(
            "/api/tracker/programs/{id}/students/{student_id}",
            post(tracker_handlers::enroll_student).delete(tracker_handlers::unenroll_student),
        )
        .route(
            "/api/tracker/sessions/{id}",
            put(tracker_handlers::update_session).delete(tracker_handlers::delete_session),
        )
        .route("/api/tracker/students/by-slug/{slug}", get(tracker_handlers::get_student_by_slug))
        .route(
            "/api/tracker/students/{id}",
            get(tracker_handlers::get_student)
                .put(tracker_handlers::update_student)
                .delete(tracker_handlers::delete_student),
        )
        .route(
            "/api/tracker/students/{id}/entries",
            get(tracker_handlers::list_entries).post(tracker_handlers::create_entry),
        )
        .route(
            "/api/tracker/entries/{id}",
            put(tracker_handlers::update_entry).delete(tracker_handlers::delete_entry),
        )
        .route_layer(middleware::from_fn(mw_auth::require_instructor));

    // --- Router Final ---
    Router::new()
        .merge(public_routes)
        .merge(parent_routes)
        .merge(tracker_routes)
        .with_state(app_state)
}
