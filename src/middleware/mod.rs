/// Middleware module
///
/// Request-time authentication for protected routes.

mod auth_gate;

pub use auth_gate::{authenticate, extract_bearer, AuthGate, AuthenticatedUser};
