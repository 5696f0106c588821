use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web::Data,
};
use tracing::debug;

use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::models::TokenType;

/// Pulls the bearer token out of an `Authorization` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn reject(req: ServiceRequest, message: &str) -> ServiceResponse<BoxBody> {
    let resp = AppError::unauthorized(message).error_response();
    req.into_response(resp)
}

/// Verifies the access token and stores the caller as an `AuthUser` extension.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| AppError::internal("App config missing"))?
        .clone();

    let header_value = match req.headers().get("Authorization") {
        Some(h) => match h.to_str() {
            Ok(v) => v.to_owned(),
            Err(_) => return Ok(reject(req, "Invalid Authorization header encoding")),
        },
        None => return Ok(reject(req, "Authorization header missing")),
    };

    let Some(token) = bearer_token(&header_value) else {
        return Ok(reject(req, "Authorization header must start with Bearer"));
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "Token rejected");
            return Ok(reject(req, "Invalid or expired token"));
        }
    };

    if claims.token_type != TokenType::Access {
        return Ok(reject(req, "Access token required"));
    }

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        username: claims.sub,
        role_id: claims.role_id,
    });

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use actix_web::test::{TestRequest, call_and_read_body, call_service, init_service};
    use actix_web::{App, HttpResponse, http::StatusCode, middleware::from_fn, web};

    fn config() -> Config {
        Config::for_tests()
    }

    async fn whoami(user: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(format!("{}:{}", user.user_id, user.role_id))
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer   "), None);
        assert_eq!(bearer_token("Basic abc"), None);
    }

    #[actix_web::test]
    async fn access_token_passes_and_sets_the_caller() {
        let cfg = config();
        let token = generate_access_token(7, "budi", 2, &cfg.jwt_secret, 900).unwrap();
        let app = init_service(
            App::new()
                .app_data(Data::new(cfg))
                .wrap(from_fn(auth_middleware))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let req = TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body = call_and_read_body(&app, req).await;
        assert_eq!(body, web::Bytes::from_static(b"7:2"));
    }

    #[actix_web::test]
    async fn missing_invalid_or_refresh_tokens_are_unauthorized() {
        let cfg = config();
        let (refresh, _) = generate_refresh_token(7, "budi", 2, &cfg.jwt_secret, 900).unwrap();
        let app = init_service(
            App::new()
                .app_data(Data::new(cfg))
                .wrap(from_fn(auth_middleware))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let no_header = TestRequest::get().uri("/me").to_request();
        assert_eq!(
            call_service(&app, no_header).await.status(),
            StatusCode::UNAUTHORIZED
        );

        let garbage = TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", "Bearer not-a-jwt"))
            .to_request();
        assert_eq!(
            call_service(&app, garbage).await.status(),
            StatusCode::UNAUTHORIZED
        );

        let wrong_type = TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", format!("Bearer {refresh}")))
            .to_request();
        assert_eq!(
            call_service(&app, wrong_type).await.status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
