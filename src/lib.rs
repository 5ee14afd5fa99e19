pub mod auth;
pub mod cli;
pub mod clients;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod payments;
pub mod server;
pub mod store;
