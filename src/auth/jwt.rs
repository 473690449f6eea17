use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::{Claims, TokenType};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
}

fn generate_token(
    user_id: i64,
    email: String,
    full_name: String,
    token_type: TokenType,
    secret: &str,
    ttl: usize,
) -> (String, Claims) {
    let claims = Claims {
        user_id,
        sub: email,
        full_name,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("JWT encoding cannot fail with HS256 and serializable claims");

    (token, claims)
}

pub fn generate_access_token(
    user_id: i64,
    email: String,
    full_name: String,
    secret: &str,
    ttl: usize,
) -> String {
    generate_token(user_id, email, full_name, TokenType::Access, secret, ttl).0
}

pub fn generate_refresh_token(
    user_id: i64,
    email: String,
    full_name: String,
    secret: &str,
    ttl: usize,
) -> (String, Claims) {
    generate_token(user_id, email, full_name, TokenType::Refresh, secret, ttl)
}

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

    #[test]
    fn access_token_round_trips() {
        let token = generate_access_token(7, "a@b.c".into(), "Ada".into(), "secret", 60);
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.sub, "a@b.c");
        assert_eq!(claims.full_name, "Ada");
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_access_token(7, "a@b.c".into(), "Ada".into(), "secret", 60);
        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn refresh_claims_carry_a_unique_jti() {
        let (_, a) = generate_refresh_token(1, "a@b.c".into(), "Ada".into(), "secret", 60);
        let (_, b) = generate_refresh_token(1, "a@b.c".into(), "Ada".into(), "secret", 60);
        assert_ne!(a.jti, b.jti);
    }
}
