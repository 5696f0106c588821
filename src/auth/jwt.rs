use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Claims, TokenType};

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

fn issue(
    user_id: u64,
    username: &str,
    role_id: u64,
    token_type: TokenType,
    secret: &str,
    ttl: usize,
) -> AppResult<(String, Claims)> {
    let claims = Claims {
        user_id,
        role_id,
        sub: username.to_string(),
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(format!("JWT encoding failed: {e}")))?;

    Ok((token, claims))
}

pub fn generate_access_token(
    user_id: u64,
    username: &str,
    role_id: u64,
    secret: &str,
    ttl: usize,
) -> AppResult<String> {
    issue(user_id, username, role_id, TokenType::Access, secret, ttl).map(|(token, _)| token)
}

pub fn generate_refresh_token(
    user_id: u64,
    username: &str,
    role_id: u64,
    secret: &str,
    ttl: usize,
) -> AppResult<(String, Claims)> {
    issue(user_id, username, role_id, TokenType::Refresh, secret, ttl)
}

/// HS256 signature and expiry are checked; the token type is left to the caller.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn access_token_round_trip_keeps_the_claim_contract() {
        let token = generate_access_token(7, "budi", 2, SECRET, 900).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();

        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.role_id, 2);
        assert_eq!(claims.sub, "budi");
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn refresh_tokens_get_unique_ids() {
        let (_, a) = generate_refresh_token(7, "budi", 2, SECRET, 900).unwrap();
        let (_, b) = generate_refresh_token(7, "budi", 2, SECRET, 900).unwrap();
        assert_ne!(a.jti, b.jti);
        assert_eq!(a.token_type, TokenType::Refresh);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_access_token(7, "budi", 2, SECRET, 900).unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
    }
}
