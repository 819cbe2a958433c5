//! Credential and token lifecycle service.
//!
//! Password hashing, stateless access tokens and rotating, revocable
//! refresh tokens, served over actix-web.

pub mod auth;
pub mod configuration;
pub mod error;
pub mod logger;
pub mod middleware;
pub mod routes;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod validators;
