pub mod routes;
pub mod token;
pub mod webhook;
