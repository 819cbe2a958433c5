/// Authentication Gate
///
/// Validates the bearer access token on every protected request and injects
/// the caller's identity into request extensions. Stateless: the gate only
/// talks to the token codec, never to storage.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpMessage,
};
use chrono::{DateTime, Utc};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use uuid::Uuid;

use crate::auth::AccessTokenCodec;
use crate::error::{AppError, AuthError};

const BEARER_PREFIX: &str = "Bearer ";

/// Identity of the caller, valid for the current request only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Extract the token from an `Authorization: Bearer <token>` value.
pub fn extract_bearer(header_value: Option<&str>) -> Result<&str, AuthError> {
    let value = header_value.ok_or(AuthError::MissingToken)?;
    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::MalformedHeader)?;

    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}

/// Resolve an `Authorization` header value to the caller's identity.
pub fn authenticate(
    codec: &AccessTokenCodec,
    header_value: Option<&str>,
    now: DateTime<Utc>,
) -> Result<AuthenticatedUser, AuthError> {
    let token = extract_bearer(header_value)?;
    let user_id = codec.verify(token, now)?;
    Ok(AuthenticatedUser { user_id })
}

/// Middleware guarding a scope of protected routes
pub struct AuthGate {
    codec: AccessTokenCodec,
}

impl AuthGate {
    pub fn new(codec: AccessTokenCodec) -> Self {
        Self { codec }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthGateService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AuthGateService {
            service: Rc::new(service),
            codec: self.codec.clone(),
        }))
    }
}

pub struct AuthGateService<S> {
    service: Rc<S>,
    codec: AccessTokenCodec,
}

impl<S, B> Service<ServiceRequest> for AuthGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let header_value = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match authenticate(&self.codec, header_value, Utc::now()) {
            Ok(user) => {
                req.extensions_mut().insert(user);
                tracing::debug!(user_id = %user.user_id, "Access token accepted");

                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(e) => {
                tracing::warn!(reason = %e, path = %req.path(), "Request rejected by auth gate");
                Box::pin(async move { Err(AppError::Auth(e).into()) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn codec() -> AccessTokenCodec {
        AccessTokenCodec::new("test-secret-key-at-least-32-characters-long", Duration::minutes(15))
            .unwrap()
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(Some("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(extract_bearer(None), Err(AuthError::MissingToken));
    }

    #[test]
    fn test_wrong_scheme() {
        let malformed = [
            "bearer abc",
            "Basic dXNlcjpwYXNz",
            "Bearer",
            "Bearer ",
            "Bearer a b",
            "abc.def.ghi",
        ];

        for value in malformed {
            assert_eq!(
                extract_bearer(Some(value)),
                Err(AuthError::MalformedHeader),
                "{} should be rejected",
                value
            );
        }
    }

    #[test]
    fn test_authenticate() {
        let codec = codec();
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let token = codec.issue(user_id, now).unwrap();

        let header_value = format!("Bearer {}", token);
        assert_eq!(
            authenticate(&codec, Some(&header_value), now),
            Ok(AuthenticatedUser { user_id })
        );
        assert_eq!(
            authenticate(&codec, Some(&header_value), now + Duration::minutes(16)),
            Err(AuthError::InvalidToken)
        );
        assert_eq!(
            authenticate(&codec, Some(&token), now),
            Err(AuthError::MalformedHeader)
        );
    }
}
