// src/services/mod.rs
pub mod access_service;
pub mod account_service;
pub mod auth_service;
pub mod cron_service;
pub mod email_service;
pub mod portfolio_service;
pub mod subscription_service;
pub mod tracker_service;
pub mod webhook_service;
