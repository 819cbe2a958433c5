/// Authentication module
///
/// Password hashing, access token issuance/verification, and the refresh
/// token lifecycle, composed behind `AuthService`.

mod claims;
mod jwt;
mod lifecycle;
mod password;
mod refresh_token;
mod service;

pub use claims::Claims;
pub use jwt::AccessTokenCodec;
pub use lifecycle::{RefreshTokenManager, RotatedRefreshToken};
pub use password::{CredentialHasher, DEFAULT_PASSWORD_HASH_COST};
pub use refresh_token::{generate_refresh_token, hash_refresh_token, REFRESH_TOKEN_LENGTH};
pub use service::{AuthService, IssuedTokens};
