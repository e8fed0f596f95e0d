// src/web/tests.rs
// Testes HTTP de ponta a ponta: router completo + sessões em memória.
use crate::{
    config::AppConfig,
    db::test_pool,
    services::{
        email_service::{Mailer, RecordingMailer},
        webhook_service,
    },
    state::AppState,
    web::routes::create_router,
};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;
use tower_sessions::{MemoryStore, SessionManagerLayer};

struct TestApp {
    router: Router,
    state: AppState,
    recording: RecordingMailer,
}

async fn test_app() -> TestApp {
    let recording = RecordingMailer::default();
    let state = AppState {
        db_pool: test_pool().await,
        config: Arc::new(AppConfig::for_tests()),
        mailer: Mailer::Recording(recording.clone()),
        email_retry_delay: Duration::ZERO,
    };
    let router = create_router(state.clone()).layer(SessionManagerLayer::new(MemoryStore::default()));
    TestApp {
        router,
        state,
        recording,
    }
}

/// Cliente com o seu próprio cookie de sessão.
struct Client {
    router: Router,
    cookie: Option<String>,
}

struct TestResponse {
    status: StatusCode,
    location: Option<String>,
    body: String,
}

impl TestResponse {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

impl Client {
    fn new(app: &TestApp) -> Self {
        Self {
            router: app.router.clone(),
            cookie: None,
        }
    }

    async fn send(&mut self, mut request: Request<Body>) -> TestResponse {
        if let Some(cookie) = &self.cookie {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }
        let response = self.router.clone().oneshot(request).await.unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap().to_string();
            self.cookie = match pair.split_once('=') {
                Some((_, value)) if !value.is_empty() => Some(pair),
                _ => None,
            };
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            location,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    async fn call(&mut self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        self.send(request).await
    }

    async fn get(&mut self, uri: &str) -> TestResponse {
        self.call(Method::GET, uri, None).await
    }

    async fn post(&mut self, uri: &str, body: Value) -> TestResponse {
        self.call(Method::POST, uri, Some(body)).await
    }

    async fn post_form(&mut self, uri: &str, form: &str) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap();
        self.send(request).await
    }
}

async fn parent(app: &TestApp, email: &str) -> Client {
    let mut client = Client::new(app);
    let res = client
        .post(
            "/api/auth/register",
            json!({ "email": email, "password": "password123", "name": "Parent" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    client
}

async fn instructor(app: &TestApp, username: &str) -> Client {
    let mut client = Client::new(app);
    let res = client
        .post(
            "/api/tracker/auth/register",
            json!({ "username": username, "password": "password123", "name": "Coach" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    client
}

#[tokio::test]
async fn health_and_templates_are_public() {
    let app = test_app().await;
    let mut client = Client::new(&app);

    assert_eq!(client.get("/api/health").await.status, StatusCode::OK);

    let res = client.get("/api/templates").await;
    assert_eq!(res.status, StatusCode::OK);
    let templates = res.json();
    assert!(templates
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t["id"] == "classic" && t["premium"] == false));
}

#[tokio::test]
async fn protected_routes_require_the_right_session() {
    let app = test_app().await;
    let mut anonymous = Client::new(&app);
    assert_eq!(anonymous.get("/api/portfolios").await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.get("/api/tracker/programs").await.status, StatusCode::UNAUTHORIZED);

    // Uma sessão de pai/mãe não abre o tracker
    let mut parent = parent(&app, "mum@example.com").await;
    assert_eq!(parent.get("/api/auth/me").await.status, StatusCode::OK);
    assert_eq!(parent.get("/api/tracker/programs").await.status, StatusCode::UNAUTHORIZED);

    let res = parent.call(Method::POST, "/api/auth/logout", None).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert_eq!(parent.get("/api/auth/me").await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_rejects_wrong_password_and_accepts_right_one() {
    let app = test_app().await;
    parent(&app, "dad@example.com").await;

    let mut client = Client::new(&app);
    let res = client
        .post("/api/auth/login", json!({ "email": "dad@example.com", "password": "nope-nope" }))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = client
        .post("/api/auth/login", json!({ "email": "dad@example.com", "password": "password123" }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(client.get("/api/auth/me").await.json()["email"], "dad@example.com");
}

#[tokio::test]
async fn free_plan_is_limited_until_trial_starts() {
    let app = test_app().await;
    let mut client = parent(&app, "mum@example.com").await;

    let res = client.post("/api/portfolios", json!({ "child_name": "Mia" })).await;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = client.post("/api/portfolios", json!({ "child_name": "Leo" })).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert!(res.json()["error"].as_str().unwrap().contains("Upgrade to Premium"));

    let res = client.post("/api/subscription/start-trial", json!({})).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["subscription_plan"], "trial");

    let res = client.post("/api/portfolios", json!({ "child_name": "Leo" })).await;
    assert_eq!(res.status, StatusCode::CREATED);

    let summary = client.get("/api/subscription").await.json();
    assert_eq!(summary["plan"], "trial");
    assert_eq!(summary["usage"]["portfolios"], 2);

    let gate = client.get("/api/subscription/features/password_protection").await.json();
    assert_eq!(gate["allowed"], true);
    assert_eq!(
        client.get("/api/subscription/features/teleportation").await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn password_protected_portfolio_unlocks_for_the_session() {
    let app = test_app().await;
    let mut owner = parent(&app, "mum@example.com").await;
    owner.post("/api/subscription/start-trial", json!({})).await;

    let res = owner
        .post(
            "/api/portfolios",
            json!({ "child_name": "Mia", "template": "modern", "password": "open-sesame" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let portfolio = res.json();
    assert_eq!(portfolio["is_private"], true);
    assert_eq!(portfolio["has_password"], true);
    let id = portfolio["id"].as_str().unwrap().to_string();

    let res = owner
        .post(
            &format!("/api/portfolios/{}/highlights", id),
            json!({ "title": "First recital", "highlight_date": "2025-05-01" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);

    // O dono vê sempre
    let access = owner.get(&format!("/api/public/portfolios/{}/access", id)).await.json();
    assert_eq!(access["access_type"], "owner");

    let mut visitor = Client::new(&app);
    let res = visitor.get(&format!("/api/public/portfolios/{}", id)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.json()["requires_password"], true);

    let page = visitor.get(&format!("/p/{}", id)).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("<form"));
    assert!(!page.body.contains("First recital"));

    let res = visitor
        .post(
            &format!("/api/public/portfolios/{}/verify-password", id),
            json!({ "password": "wrong" }),
        )
        .await;
    assert_eq!(res.json()["verified"], false);

    let res = visitor
        .post(
            &format!("/api/public/portfolios/{}/verify-password", id),
            json!({ "password": "open-sesame" }),
        )
        .await;
    assert_eq!(res.json()["verified"], true);

    let res = visitor.get(&format!("/api/public/portfolios/{}", id)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["highlights"][0]["title"], "First recital");
    let access = visitor.get(&format!("/api/public/portfolios/{}/access", id)).await.json();
    assert_eq!(access["access_type"], "password");

    // Outro visitante continua bloqueado
    let mut stranger = Client::new(&app);
    let access = stranger.get(&format!("/api/public/portfolios/{}/access", id)).await.json();
    assert_eq!(access["has_access"], false);
}

#[tokio::test]
async fn unlock_form_redirects_with_error_or_to_page() {
    let app = test_app().await;
    let mut owner = parent(&app, "mum@example.com").await;
    owner.post("/api/subscription/start-trial", json!({})).await;
    let id = owner
        .post("/api/portfolios", json!({ "child_name": "Mia", "password": "open-sesame" }))
        .await
        .json()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let mut visitor = Client::new(&app);
    let res = visitor.post_form(&format!("/p/{}/unlock", id), "password=bad").await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    let location = res.location.unwrap();
    assert!(location.starts_with(&format!("/p/{}?error=", id)));

    let page = visitor.get(&location).await;
    assert!(page.body.contains("Incorrect password."));

    let res = visitor.post_form(&format!("/p/{}/unlock", id), "password=open-sesame").await;
    assert_eq!(res.location.as_deref(), Some(format!("/p/{}", id).as_str()));
    let page = visitor.get(&format!("/p/{}", id)).await;
    assert!(page.body.contains("<h1>Mia</h1>"));
}

#[tokio::test]
async fn unknown_portfolio_is_not_found() {
    let app = test_app().await;
    let mut visitor = Client::new(&app);
    assert_eq!(visitor.get("/api/public/portfolios/nope").await.status, StatusCode::NOT_FOUND);
    let access = visitor.get("/api/public/portfolios/nope/access").await.json();
    assert_eq!(access["has_access"], false);
}

#[tokio::test]
async fn invitation_emails_a_share_link() {
    let app = test_app().await;
    let mut owner = parent(&app, "mum@example.com").await;
    let id = owner
        .post("/api/portfolios", json!({ "child_name": "Mia" }))
        .await
        .json()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let res = owner
        .post(
            &format!("/api/portfolios/{}/invitations", id),
            json!({ "email": "grandma@example.com" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.json()["email_sent"], true);

    let sent = app.recording.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "grandma@example.com");
    assert!(sent[0].text.contains(&format!("http://localhost:3000/p/{}", id)));
}

#[tokio::test]
async fn instructors_only_see_their_own_programs() {
    let app = test_app().await;
    let mut coach = instructor(&app, "coach").await;
    let mut rival = instructor(&app, "rival").await;

    let res = coach
        .post("/api/tracker/programs", json!({ "title": "Robotics Club" }))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let program_id = res.json()["id"].as_str().unwrap().to_string();

    let res = coach
        .post(
            &format!("/api/tracker/programs/{}/students", program_id),
            json!({ "name": "Ana Lima" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let student = res.json();
    assert!(student["slug"].as_str().unwrap().starts_with("ana-lima-"));
    let student_id = student["id"].as_str().unwrap().to_string();

    let res = coach
        .post(
            &format!("/api/tracker/students/{}/entries", student_id),
            json!({ "title": "Built a rover", "entry_date": "2025-03-10" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.json()["entry_type"], "achievement");

    let students = coach
        .get(&format!("/api/tracker/programs/{}/students", program_id))
        .await
        .json();
    assert_eq!(students.as_array().unwrap().len(), 1);

    let by_slug = coach
        .get(&format!("/api/tracker/students/by-slug/{}", student["slug"].as_str().unwrap()))
        .await;
    assert_eq!(by_slug.status, StatusCode::OK);

    assert_eq!(
        rival.get(&format!("/api/tracker/programs/{}", program_id)).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        rival.get(&format!("/api/tracker/students/{}", student_id)).await.status,
        StatusCode::NOT_FOUND
    );
    assert!(rival.get("/api/tracker/programs").await.json().as_array().unwrap().is_empty());
}

#[tokio::test]
async fn tracker_validates_program_dates() {
    let app = test_app().await;
    let mut coach = instructor(&app, "coach").await;
    let res = coach
        .post(
            "/api/tracker/programs",
            json!({ "title": "Camp", "start_date": "2025-07-10", "end_date": "2025-07-01" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

async fn post_webhook(client: &mut Client, payload: &str, signature: &str) -> TestResponse {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/stripe/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .header("stripe-signature", signature)
        .body(Body::from(payload.to_string()))
        .unwrap();
    client.send(request).await
}

#[tokio::test]
async fn stripe_checkout_webhook_upgrades_the_parent() {
    let app = test_app().await;
    let mut parent_client = parent(&app, "mum@example.com").await;
    let user_id = parent_client.get("/api/auth/me").await.json()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let payload = json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "created": Utc::now().timestamp(),
        "data": { "object": { "metadata": { "userId": user_id }, "customer": "cus_1", "subscription": "sub_1" } }
    })
    .to_string();
    let secret = &app.state.config.stripe_webhook_secret;

    let mut stripe = Client::new(&app);
    let bad = post_webhook(&mut stripe, &payload, "t=1,v1=deadbeef").await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);

    let signature = webhook_service::sign_payload(&payload, secret, Utc::now().timestamp());
    let res = post_webhook(&mut stripe, &payload, &signature).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["received"], true);

    let me = parent_client.get("/api/auth/me").await.json();
    assert_eq!(me["subscription_plan"], "premium");

    // Tipos desconhecidos são aceites e ignorados
    let unknown = json!({ "id": "evt_2", "type": "charge.refunded", "created": 0, "data": { "object": {} } })
        .to_string();
    let signature = webhook_service::sign_payload(&unknown, secret, Utc::now().timestamp());
    assert_eq!(post_webhook(&mut stripe, &unknown, &signature).await.status, StatusCode::OK);

    // Evento conhecido sem os campos esperados: 500 para a Stripe repetir
    let broken = json!({ "id": "evt_3", "type": "invoice.payment_failed", "created": 0, "data": { "object": {} } })
        .to_string();
    let signature = webhook_service::sign_payload(&broken, secret, Utc::now().timestamp());
    assert_eq!(
        post_webhook(&mut stripe, &broken, &signature).await.status,
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[tokio::test]
async fn cron_endpoints_require_the_bearer_secret() {
    let app = test_app().await;
    let mut cron = Client::new(&app);

    let res = cron
        .call(Method::POST, "/api/cron/trial-reminders", None)
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    for uri in ["/api/cron/trial-reminders", "/api/cron/event-followups"] {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", app.state.config.cron_secret),
            )
            .body(Body::empty())
            .unwrap();
        let res = cron.send(request).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.json()["processed"], 0);
    }
}
