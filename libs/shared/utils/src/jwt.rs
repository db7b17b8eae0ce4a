use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use thiserror::Error;
use tracing::debug;

use shared_models::auth::{JwtClaims, User};
use shared_models::error::AppError;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("JWT secret is not set")]
    MissingSecret,
    #[error("Invalid token format")]
    Malformed,
    #[error("Unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("Invalid token signature")]
    BadSignature,
    #[error("Invalid claims format")]
    BadClaims,
    #[error("Token expired")]
    Expired,
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Auth(err.to_string())
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is checked against the application clock below; `exp` is optional
    // in identity-provider tokens.
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}

/// Verifies an HS256 identity-provider token as of `now` and returns the
/// asserted identity.
pub fn validate_token(token: &str, jwt_secret: &str, now: DateTime<Utc>) -> Result<User, TokenError> {
    if jwt_secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let header = decode_header(token).map_err(|e| {
        debug!("Failed to decode token header: {}", e);
        TokenError::Malformed
    })?;
    if header.alg != Algorithm::HS256 {
        return Err(TokenError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
    }

    let data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::InvalidSignature => {
            debug!("Token signature verification failed");
            TokenError::BadSignature
        }
        ErrorKind::Json(_) => {
            debug!("Failed to parse claims: {}", e);
            TokenError::BadClaims
        }
        _ => {
            debug!("Token rejected: {}", e);
            TokenError::Malformed
        }
    })?;
    let claims = data.claims;

    if let Some(exp) = claims.exp {
        let now_secs = now.timestamp().max(0) as u64;
        if exp < now_secs {
            debug!("Token expired at {} (now: {})", exp, now_secs);
            return Err(TokenError::Expired);
        }
    }

    let created_at = claims
        .iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = User {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        metadata: claims.user_metadata,
        created_at,
    };

    debug!("Token validated successfully for subject: {}", user.id);
    Ok(user)
}
