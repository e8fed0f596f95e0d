// src/web/mod.rs
pub mod auth_handlers;
pub mod cron_handlers;
pub mod health_handlers;
pub mod mw_auth;
pub mod portfolio_handlers;
pub mod public_handlers;
pub mod routes;
pub mod subscription_handlers;
pub mod tracker_handlers;
pub mod webhook_handlers;

#[cfg(test)]
mod tests;
