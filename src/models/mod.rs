// src/models/mod.rs
pub mod access;
pub mod portfolio;
pub mod subscription;
pub mod tracker;
pub mod user;
pub mod webhook;
