use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub exp: usize,
}

/// Identity of the caller, extracted from the `Authorization: Bearer` header.
/// Tokens are stateless; no lookup happens here.
#[derive(Clone, Copy, Debug)]
pub struct AuthUser {
    pub user_id: i32,
}

pub fn issue_token(config: &AppConfig, user_id: i32) -> Result<String, AppError> {
    let exp = (Utc::now() + Duration::days(config.token_expiry_days)).timestamp() as usize;
    let claims = Claims { sub: user_id, exp };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|_| AppError::Internal)
}

pub fn verify_token(config: &AppConfig, token: &str) -> Result<i32, AppError> {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims.sub)
        .map_err(|_| AppError::unauthorized("invalid or expired token"))
}

fn extract_bearer(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result: Result<AuthUser, AppError> = (|| {
            let config = req
                .app_data::<web::Data<AppConfig>>()
                .ok_or(AppError::Internal)?;
            let token =
                extract_bearer(req).ok_or_else(|| AppError::unauthorized("missing bearer token"))?;
            let user_id = verify_token(config, &token)?;
            Ok(AuthUser { user_id })
        })();
        ready(result.map_err(Into::into))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            server_port: 0,
            sqlite_path: String::new(),
            database_url: None,
            jwt_secret: "unit-test-secret".to_string(),
            token_expiry_days: 30,
        }
    }

    #[test]
    fn token_round_trip_yields_same_user_id() {
        let config = test_config();
        let token = issue_token(&config, 42).unwrap();
        assert_eq!(verify_token(&config, &token).unwrap(), 42);
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = test_config();
        let claims = Claims {
            sub: 7,
            exp: (Utc::now() - Duration::days(1)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            verify_token(&config, &token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let config = test_config();
        let mut other = test_config();
        other.jwt_secret = "someone-else".to_string();
        let token = issue_token(&other, 1).unwrap();
        assert!(verify_token(&config, &token).is_err());
    }

    #[test]
    fn bearer_header_parsing() {
        let req = actix_web::test::TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(extract_bearer(&req).as_deref(), Some("abc.def.ghi"));

        let req = actix_web::test::TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic abc"))
            .to_http_request();
        assert!(extract_bearer(&req).is_none());

        let req = actix_web::test::TestRequest::default().to_http_request();
        assert!(extract_bearer(&req).is_none());
    }
}
