//! services/api/src/adapters/token.rs
//!
//! `TokenService` implementation. Confirmation codes are self-describing
//! `<timestamp>-<nonce>-<mac>` strings signed with HMAC-SHA256, so they can
//! be validated without a server-side index. Access tokens are HS256 JWTs.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use critique_core::domain::AccessClaims;
use critique_core::ports::{PortError, PortResult, TokenService};
use critique_core::User;
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// JWT claims carried by access tokens.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    iat: i64,
    exp: i64,
}

/// Signs and verifies confirmation codes and access tokens with a single
/// shared secret.
pub struct SignerAdapter {
    secret: Vec<u8>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_token_ttl_hours: i64,
    confirmation_ttl_secs: u64,
}

impl SignerAdapter {
    pub fn new(secret: &str, access_token_ttl_hours: i64, confirmation_ttl_secs: u64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            access_token_ttl_hours,
            confirmation_ttl_secs,
        }
    }

    fn unix_now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
    }

    /// Computes the MAC over the user's identity and the code metadata. The
    /// user id in the payload binds each code to one account.
    fn mac_for(&self, user: &User, timestamp: u64, nonce_hex: &str) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        let payload = format!("{}:{}:{}:{}", user.id, user.username, timestamp, nonce_hex);
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

#[async_trait]
impl TokenService for SignerAdapter {
    async fn issue_confirmation_code(&self, user: &User) -> PortResult<String> {
        let timestamp = Self::unix_now();
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);
        let nonce_hex = hex::encode(nonce);
        let mac_hex = hex::encode(self.mac_for(user, timestamp, &nonce_hex));
        Ok(format!("{:x}-{}-{}", timestamp, nonce_hex, mac_hex))
    }

    async fn check_confirmation_code(&self, user: &User, code: &str) -> PortResult<bool> {
        // Parse the timestamp-nonce-mac triple; anything malformed is just
        // an invalid code, not an error.
        let parts: Vec<&str> = code.splitn(3, '-').collect();
        if parts.len() != 3 {
            return Ok(false);
        }
        let timestamp = match u64::from_str_radix(parts[0], 16) {
            Ok(timestamp) => timestamp,
            Err(_) => return Ok(false),
        };
        let provided_mac = match hex::decode(parts[2]) {
            Ok(mac) => mac,
            Err(_) => return Ok(false),
        };

        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        let payload = format!("{}:{}:{}:{}", user.id, user.username, timestamp, parts[1]);
        mac.update(payload.as_bytes());
        if mac.verify_slice(&provided_mac).is_err() {
            return Ok(false);
        }

        // saturating_sub tolerates clock skew on codes issued "in the future".
        if Self::unix_now().saturating_sub(timestamp) > self.confirmation_ttl_secs {
            return Ok(false);
        }
        Ok(true)
    }

    async fn issue_access_token(&self, user: &User) -> PortResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.access_token_ttl_hours)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| PortError::Unexpected(format!("Failed to sign access token: {}", e)))
    }

    async fn verify_access_token(&self, token: &str) -> PortResult<AccessClaims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| PortError::Unauthorized)?;
        let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| PortError::Unauthorized)?;
        Ok(AccessClaims {
            user_id,
            username: data.claims.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use critique_core::domain::Role;

    fn test_user(username: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{}@example.com", username),
            first_name: String::new(),
            last_name: String::new(),
            bio: String::new(),
            role: Role::User,
            is_superuser: false,
            confirmation_code: None,
        }
    }

    fn adapter() -> SignerAdapter {
        SignerAdapter::new("unit-test-secret", 24, 3600)
    }

    #[tokio::test]
    async fn issued_confirmation_code_verifies() {
        let signer = adapter();
        let user = test_user("bob");
        let code = signer.issue_confirmation_code(&user).await.unwrap();
        assert!(signer.check_confirmation_code(&user, &code).await.unwrap());
    }

    #[tokio::test]
    async fn tampered_confirmation_code_is_rejected() {
        let signer = adapter();
        let user = test_user("bob");
        let code = signer.issue_confirmation_code(&user).await.unwrap();

        let mut tampered = code.clone();
        tampered.pop();
        tampered.push('0');
        // A code ending in '0' may collide with itself; flip differently then.
        if tampered == code {
            tampered.pop();
            tampered.push('1');
        }
        assert!(!signer.check_confirmation_code(&user, &tampered).await.unwrap());
    }

    #[tokio::test]
    async fn confirmation_code_is_bound_to_one_user() {
        let signer = adapter();
        let bob = test_user("bob");
        let eve = test_user("eve");
        let code = signer.issue_confirmation_code(&bob).await.unwrap();
        assert!(!signer.check_confirmation_code(&eve, &code).await.unwrap());
    }

    #[tokio::test]
    async fn expired_confirmation_code_is_rejected() {
        let signer = SignerAdapter::new("unit-test-secret", 24, 5);
        let user = test_user("bob");

        let old_timestamp = SignerAdapter::unix_now() - 10;
        let nonce_hex = hex::encode([7u8; 16]);
        let mac_hex = hex::encode(signer.mac_for(&user, old_timestamp, &nonce_hex));
        let code = format!("{:x}-{}-{}", old_timestamp, nonce_hex, mac_hex);

        assert!(!signer.check_confirmation_code(&user, &code).await.unwrap());
    }

    #[tokio::test]
    async fn garbage_confirmation_codes_are_rejected_not_errors() {
        let signer = adapter();
        let user = test_user("bob");
        for garbage in ["", "abc", "--", "zz-zz-zz", "123", "1-2"] {
            assert!(!signer.check_confirmation_code(&user, garbage).await.unwrap());
        }
    }

    #[tokio::test]
    async fn access_token_round_trips_identity() {
        let signer = adapter();
        let user = test_user("bob");
        let token = signer.issue_access_token(&user).await.unwrap();
        let claims = signer.verify_access_token(&token).await.unwrap();
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.username, "bob");
    }

    #[tokio::test]
    async fn access_token_signed_with_other_secret_is_rejected() {
        let signer = adapter();
        let other = SignerAdapter::new("some-other-secret", 24, 3600);
        let user = test_user("bob");
        let token = other.issue_access_token(&user).await.unwrap();
        assert!(matches!(
            signer.verify_access_token(&token).await,
            Err(PortError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn expired_access_token_is_rejected() {
        let signer = SignerAdapter::new("unit-test-secret", -1, 3600);
        let user = test_user("bob");
        let token = signer.issue_access_token(&user).await.unwrap();
        assert!(matches!(
            signer.verify_access_token(&token).await,
            Err(PortError::Unauthorized)
        ));
    }
}
