use actix_web::{HttpRequest, HttpResponse, http::header, web};
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument, warn};
use validator::Validate;

use crate::{
    api::{ok, user::fetch_user_detail},
    auth::{
        auth::AuthUser,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        middleware::bearer_token,
        password::verify_password,
    },
    config::Config,
    error::{AppError, AppResult},
    model::user::User,
    models::{Claims, LoginReqDto, TokenPair, TokenType},
    utils::identity::normalize,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

fn refresh_claims(req: &HttpRequest, config: &Config) -> Option<Claims> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)?;

    verify_token(token, &config.jwt_secret)
        .ok()
        .filter(|claims| claims.token_type == TokenType::Refresh)
}

/// Issues an access/refresh pair and records the refresh token's `jti`.
async fn issue_pair(
    user_id: u64,
    username: &str,
    role_id: u64,
    pool: &MySqlPool,
    config: &Config,
) -> AppResult<TokenPair> {
    let access_token = generate_access_token(
        user_id,
        username,
        role_id,
        &config.jwt_secret,
        config.access_token_ttl,
    )?;
    let (refresh_token, claims) = generate_refresh_token(
        user_id,
        username,
        role_id,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )?;

    debug!(user_id, jti = %claims.jti, "Storing refresh token");
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPair),
        (status = 400, description = "Malformed e-mail or empty password"),
        (status = 401, description = "Invalid email or password, or inactive account")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(pool, config, payload), fields(email = %payload.email))]
pub async fn login(
    payload: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    payload.validate()?;
    let email = normalize(&payload.email);

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password, role_id, is_active, created_at, updated_at
        FROM `user`
        WHERE email = ?
        "#,
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await?;

    let Some(user) = user else {
        info!("Login rejected: unknown e-mail");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    };

    if !verify_password(&payload.password, &user.password) {
        info!(user_id = user.id, "Login rejected: password mismatch");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    if !user.is_active {
        info!(user_id = user.id, "Login rejected: inactive account");
        return Err(AppError::unauthorized("User account is inactive"));
    }

    let pair = issue_pair(user.id, &user.username, user.role_id, pool.get_ref(), &config).await?;

    if let Err(e) = sqlx::query("UPDATE `user` SET last_login_at = NOW() WHERE id = ?")
        .bind(user.id)
        .execute(pool.get_ref())
        .await
    {
        // login still succeeds
        error!(error = %e, user_id = user.id, "Failed to update last_login_at");
    }

    info!(user_id = user.id, "Login successful");
    Ok(HttpResponse::Ok().json(pair))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Missing, invalid, revoked or expired refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
#[instrument(name = "auth_refresh", skip_all)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let claims =
        refresh_claims(&req, &config).ok_or_else(|| AppError::unauthorized("Invalid refresh token"))?;

    // Single use: only the request that flips `revoked` may rotate.
    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = TRUE
        WHERE jti = ? AND revoked = FALSE AND expires_at > NOW()
        "#,
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await?;

    if revoked.rows_affected() == 0 {
        warn!(user_id = claims.user_id, jti = %claims.jti, "Refresh token reused or unknown");
        return Err(AppError::unauthorized("Invalid refresh token"));
    }

    // Role or activation may have changed since the token was issued.
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password, role_id, is_active, created_at, updated_at
        FROM `user`
        WHERE id = ?
        "#,
    )
    .bind(claims.user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .filter(|u| u.is_active)
    .ok_or_else(|| AppError::unauthorized("User account is inactive"))?;

    let pair = issue_pair(user.id, &user.username, user.role_id, pool.get_ref(), &config).await?;
    info!(user_id = user.id, "Refresh token rotated");
    Ok(HttpResponse::Ok().json(pair))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Refresh token revoked (idempotent)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let Some(claims) = refresh_claims(&req, &config) else {
        return HttpResponse::NoContent().finish();
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, user_id = claims.user_id, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = crate::model::user::UserDetail),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    let user = fetch_user_detail(pool.get_ref(), auth.user_id).await?;
    Ok(ok(user))
}
