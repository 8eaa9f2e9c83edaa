// HS256 access tokens and bcrypt password hashes

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::{AuthConfig, JwtConfig};
use crate::error::{AppError, AppResult};

/// JWT claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The user's id.
    pub sub: i64,
    pub is_staff: bool,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            lifetime: Duration::hours(config.expires_in_hours),
        }
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime.num_seconds()
    }

    pub fn issue(&self, user_id: i64, is_staff: bool) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            is_staff,
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("failed to sign token: {e}")))
    }

    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(config: &AuthConfig) -> Self {
        Self { cost: config.bcrypt_cost }
    }

    pub fn hash(&self, password: &str) -> AppResult<String> {
        bcrypt::hash(password, self.cost)
            .map_err(|e| AppError::Internal(format!("failed to hash password: {e}")))
    }

    /// A malformed stored hash counts as a mismatch.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn tokens() -> TokenService {
        TokenService::new(&Config::for_tests().jwt)
    }

    #[test]
    fn issued_token_round_trips_claims() {
        let service = tokens();
        let token = service.issue(42, true).unwrap();
        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert!(claims.is_staff);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = Config::for_tests().jwt;
        let now = Utc::now().timestamp();
        // Well past the default 60 second leeway.
        let claims = Claims { sub: 1, is_staff: false, iat: now - 600, exp: now - 300 };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();
        assert!(matches!(tokens().verify(&token), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let other = TokenService::new(&JwtConfig {
            secret: "a-completely-different-secret".into(),
            expires_in_hours: 1,
        });
        let token = other.issue(1, false).unwrap();
        assert!(tokens().verify(&token).is_err());
    }

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hasher = PasswordHasher::new(&Config::for_tests().auth);
        let hash = hasher.hash("pasha22335").unwrap();
        assert_ne!(hash, "pasha22335");
        assert!(hasher.verify("pasha22335", &hash));
        assert!(!hasher.verify("wrong-password", &hash));
        assert!(!hasher.verify("pasha22335", "not-a-bcrypt-hash"));
    }
}
