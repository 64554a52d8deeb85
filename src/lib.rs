// src/lib.rs
pub mod app;
pub mod body;
pub mod config;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod problem;
pub mod server;
