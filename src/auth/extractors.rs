use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use super::jwt::{JwtKeys, TokenError};
use crate::{error::AppError, policy::Actor};

/// Verified identity of the caller, taken from `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Actor);

pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, TokenError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(TokenError::MissingHeader)?
        .to_str()
        .map_err(|_| TokenError::MalformedHeader)?;

    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or(TokenError::MalformedHeader)?
        .trim();

    if token.is_empty() {
        return Err(TokenError::MalformedHeader);
    }
    Ok(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let claims = bearer_token(&parts.headers)
            .and_then(|token| keys.verify(token))
            .map_err(|e| {
                warn!(reason = ?e, "rejected bearer token");
                e
            })?;

        Ok(AuthUser(Actor {
            id: claims.sub,
            role: claims.role,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: Option<&str>) -> HeaderMap {
        let mut h = HeaderMap::new();
        if let Some(v) = value {
            h.insert(AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        }
        h
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token(&headers(Some("Bearer abc.def.ghi"))), Ok("abc.def.ghi"));
        assert_eq!(bearer_token(&headers(Some("bearer abc"))), Ok("abc"));
    }

    #[test]
    fn header_shape_failures() {
        assert_eq!(bearer_token(&headers(None)), Err(TokenError::MissingHeader));
        assert_eq!(
            bearer_token(&headers(Some("Basic dXNlcjpwYXNz"))),
            Err(TokenError::MalformedHeader)
        );
        assert_eq!(bearer_token(&headers(Some("Bearer "))), Err(TokenError::MalformedHeader));
        assert_eq!(bearer_token(&headers(Some("abc.def.ghi"))), Err(TokenError::MalformedHeader));
    }
}
