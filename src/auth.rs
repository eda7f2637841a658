use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::{Role, User},
};

/// Name of the HTTP-only session cookie.
pub const AUTH_COOKIE: &str = "auth_token";

/// Session lifetime: token expiry and cookie max-age, both 7 days.
pub const SESSION_TTL_SECS: i64 = 60 * 60 * 24 * 7;

/// Claims
///
/// The payload signed into every session JWT. The claim set is trusted for the
/// token's full lifetime without a database re-check: if a user is renamed or
/// demoted mid-session the stale values persist until expiry. This is a
/// documented limitation, not an oversight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's UUID.
    pub sub: Uuid,
    /// Display name snapshot, used for blog authorship.
    pub name: String,
    /// Role snapshot, used for every RBAC decision during the session.
    pub role: Role,
    /// Avatar URL snapshot, if the user had one when the token was issued.
    pub avatar: Option<String>,
    /// Issued At (seconds since epoch).
    pub iat: usize,
    /// Expiration Time (seconds since epoch). Always validated on decode.
    pub exp: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request, extracted straight from
/// the verified session token. Handlers use it for every ownership and role
/// check via the policy module.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub avatar: Option<String>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name,
            role: claims.role,
            avatar: claims.avatar,
        }
    }
}

/// MaybeUser
///
/// Optional variant of `AuthUser` for endpoints readable by anonymous
/// visitors: a missing or unusable token resolves to `None` instead of a 401,
/// and the visibility rules downgrade accordingly.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

// --- Password Primitives ---

/// hash_password
///
/// One-way argon2 hash with a fresh random salt. The plaintext never leaves
/// this function's scope.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!("password hashing failed: {:?}", e);
            ApiError::Server
        })
}

/// verify_password
///
/// Constant-time comparison of a candidate password against a stored argon2
/// hash. An unparsable stored hash verifies as false rather than erroring, so
/// the sign-in path stays uniform for the caller.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// --- Token Primitives ---

/// sign_session_token
///
/// Issues a signed session JWT for a freshly registered or authenticated user,
/// valid for `SESSION_TTL_SECS`.
pub fn sign_session_token(user: &User, secret: &str) -> Result<String, ApiError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id,
        name: user.name.clone(),
        role: user.role,
        avatar: user.avatar.clone(),
        iat: now as usize,
        exp: (now + SESSION_TTL_SECS) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("token signing failed: {:?}", e);
        ApiError::Server
    })
}

/// decode_claims
///
/// Decodes and validates a session token: signature and expiry only, no
/// database lookup. Expired and malformed tokens both yield the same generic
/// denial to the client.
pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|_| ApiError::unauthorized())
}

// --- Cookie Handling ---

/// session_cookie
///
/// Builds the `auth_token` cookie: HTTP-only, SameSite=Lax, path `/`, max-age
/// 7 days, Secure outside local development.
pub fn session_cookie(token: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.env == Env::Production)
        .path("/")
        .max_age(time::Duration::seconds(SESSION_TTL_SECS))
        .build()
}

/// removal_cookie
///
/// The cookie used by sign-out to clear the client-held token. The server
/// keeps no session list, so revocation is advisory only: a leaked token
/// remains valid until its expiry.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build(AUTH_COOKIE).path("/").build()
}

// --- Extractors ---

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument on any authenticated route,
/// cleanly separating authentication from business logic. The token is read
/// from the `auth_token` cookie first (the browser flow), falling back to an
/// `Authorization: Bearer` header (API clients and tests).
///
/// Rejection: the generic 401 denial on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        // Cookie flow. CookieJar extraction is infallible.
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .unwrap_or_default();

        let token = match jar.get(AUTH_COOKIE) {
            Some(cookie) => cookie.value().to_string(),
            None => {
                // Bearer fallback for non-browser clients.
                let auth_header = parts
                    .headers
                    .get(header::AUTHORIZATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(ApiError::unauthorized)?;

                auth_header
                    .strip_prefix("Bearer ")
                    .ok_or_else(ApiError::unauthorized)?
                    .to_string()
            }
        };

        let claims = decode_claims(&token, &config.jwt_secret)?;
        Ok(AuthUser::from(claims))
    }
}

/// MaybeUser Extractor Implementation
///
/// Never rejects: any authentication failure simply resolves to an anonymous
/// reader.
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            AuthUser::from_request_parts(parts, state).await.ok(),
        ))
    }
}
