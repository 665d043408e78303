use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use crate::models::{NewRefreshToken, Principal, User};
use crate::services::metrics;
use crate::services::store::Store;
use crate::services::tokens::TokenService;
use crate::services::ServiceError;
use crate::utils::{CredentialHasher, Password, PasswordHashString};

/// Tokens handed to a client after a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub principal: Principal,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    hasher: CredentialHasher,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, hasher: CredentialHasher, tokens: TokenService) -> Self {
        Self {
            store,
            hasher,
            tokens,
        }
    }

    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: Password) -> Result<LoginOutcome, ServiceError> {
        let result = self.authenticate(email, password).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(ServiceError::InvalidCredentials) => "invalid_credentials",
            Err(ServiceError::AccountInactive) => "inactive",
            Err(_) => "error",
        };
        metrics::record_login_attempt(outcome);
        result
    }

    async fn authenticate(
        &self,
        email: &str,
        password: Password,
    ) -> Result<LoginOutcome, ServiceError> {
        let user = self.store.find_user_by_email(email).await?;

        let user = match user {
            Some(user) => user,
            None => {
                self.verify(password, None).await?;
                tracing::info!("Login failed: unknown email");
                return Err(ServiceError::InvalidCredentials);
            }
        };

        if !self.verify(password, Some(&user)).await? {
            tracing::info!(user_id = %user.id, "Login failed: wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        if !user.is_active {
            tracing::info!(user_id = %user.id, "Login refused: account inactive");
            return Err(ServiceError::AccountInactive);
        }

        let principal = match self.store.find_first_membership(user.id).await? {
            Some(membership) => Principal {
                user_id: user.id,
                org_id: Some(membership.org_id),
                role: membership.role,
            },
            None => Principal::guest(user.id),
        };

        let access_token =
            self.tokens
                .issue_access(principal.user_id, principal.org_id, &principal.role)?;
        let refresh_token = self.tokens.issue_refresh()?;

        self.store
            .insert_refresh_token(&NewRefreshToken::issue(user.id, &refresh_token, Utc::now()))
            .await?;

        tracing::info!(
            user_id = %principal.user_id,
            role = %principal.role,
            "User logged in"
        );

        Ok(LoginOutcome {
            access_token,
            refresh_token,
            principal,
        })
    }

    /// Argon2 check on the blocking pool. Without a user a dummy digest is
    /// verified so both failure paths take the same time.
    async fn verify(&self, password: Password, user: Option<&User>) -> Result<bool, ServiceError> {
        let hasher = self.hasher.clone();
        let digest = user.map(|u| PasswordHashString::new(u.password_hash.clone()));

        tokio::task::spawn_blocking(move || match digest {
            Some(digest) => hasher.verify(&password, &digest),
            None => {
                hasher.verify_dummy(&password);
                false
            }
        })
        .await
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Verification task failed: {}", e)))
    }
}
