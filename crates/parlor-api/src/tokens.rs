use std::time::Duration;

use anyhow::Result;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use parlor_types::api::Claims;

/// HS256 signing keys plus the optional token lifetime. Without a lifetime,
/// tokens carry no `exp` and stay valid for as long as the secret does.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Option<Duration>,
}

impl TokenKeys {
    pub fn new(secret: &str, ttl: Option<Duration>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user_id: Uuid, username: &str) -> Result<String> {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            iat: now,
            exp: self.ttl.map(|ttl| now + ttl.as_secs() as usize),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding, &self.validation())?;
        Ok(token_data.claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        if self.ttl.is_none() {
            validation.validate_exp = false;
            validation.required_spec_claims.clear();
        }
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_to_same_identity() {
        let keys = TokenKeys::new("secret", None);
        let user_id = Uuid::new_v4();

        let claims = keys.verify(&keys.issue(user_id, "alice").unwrap()).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.exp, None);
    }

    #[test]
    fn ttl_sets_expiry() {
        let keys = TokenKeys::new("secret", Some(Duration::from_secs(3600)));
        let claims = keys.verify(&keys.issue(Uuid::new_v4(), "alice").unwrap()).unwrap();
        assert_eq!(claims.exp, Some(claims.iat + 3600));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = TokenKeys::new("one", None).issue(Uuid::new_v4(), "alice").unwrap();
        assert!(TokenKeys::new("two", None).verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = TokenKeys::new("secret", Some(Duration::from_secs(60)));
        let past = (chrono::Utc::now().timestamp() - 3600) as usize;
        let claims = Claims {
            sub: Uuid::new_v4(),
            username: "alice".into(),
            iat: past - 60,
            exp: Some(past),
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(TokenKeys::new("secret", None).verify("not.a.token").is_err());
    }
}
