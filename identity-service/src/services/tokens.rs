use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::{Principal, Role};
use crate::services::ServiceError;

/// Lifetime of an access token.
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 15;

const REFRESH_TOKEN_BYTES: usize = 32;

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<Uuid>,
    pub role: String,
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Issues HS256 access tokens and opaque refresh tokens, and validates
/// access tokens back into a [`Principal`].
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    validation: Validation,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: config.issuer.clone(),
            validation,
        }
    }

    /// Sign an access token valid for [`ACCESS_TOKEN_TTL_MINUTES`] from now.
    pub fn issue_access(
        &self,
        user_id: Uuid,
        org_id: Option<Uuid>,
        role: &Role,
    ) -> Result<String, ServiceError> {
        self.issue_access_at(user_id, org_id, role, Utc::now())
    }

    pub fn issue_access_at(
        &self,
        user_id: Uuid,
        org_id: Option<Uuid>,
        role: &Role,
        now: DateTime<Utc>,
    ) -> Result<String, ServiceError> {
        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            org_id,
            role: role.as_str().to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(ACCESS_TOKEN_TTL_MINUTES)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode access token: {}", e)))
    }

    /// 256 random bits from the OS generator, hex encoded.
    pub fn issue_refresh(&self) -> Result<String, ServiceError> {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| ServiceError::Entropy(e.to_string()))?;
        Ok(hex::encode(bytes))
    }

    /// Verify signature, algorithm, issuer and expiry and return the claims.
    pub fn decode_claims(&self, token: &str) -> Result<AccessTokenClaims, ServiceError> {
        let token_data = decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Access token rejected");
                ServiceError::InvalidToken
            })?;

        // The library accepts exp == now; a token is dead from its expiry second on.
        if token_data.claims.exp <= Utc::now().timestamp() {
            return Err(ServiceError::InvalidToken);
        }

        Ok(token_data.claims)
    }

    pub fn parse_access(&self, token: &str) -> Result<Principal, ServiceError> {
        let claims = self.decode_claims(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ServiceError::InvalidToken)?;

        Ok(Principal {
            user_id,
            org_id: claims.org_id,
            role: Role::from(claims.role),
        })
    }
}
