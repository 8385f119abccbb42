use crate::error::ApiError;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

/// Static bearer check. With no token configured every request passes.
pub fn check_bearer(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    if token.trim() != expected {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_disabled_when_unset() {
        assert!(check_bearer(&HeaderMap::new(), None).is_ok());
    }

    #[test]
    fn test_bearer_check() {
        assert!(check_bearer(&headers("Bearer s3cret"), Some("s3cret")).is_ok());
        assert!(matches!(
            check_bearer(&HeaderMap::new(), Some("s3cret")),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            check_bearer(&headers("Basic czNjcmV0"), Some("s3cret")),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            check_bearer(&headers("Bearer nope"), Some("s3cret")),
            Err(ApiError::Forbidden)
        ));
    }
}
