use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::models::{NewOrganization, NewStaffMembership, NewUser};
use crate::services::metrics;
use crate::services::store::{Store, StoreError, UnitOfWork};
use crate::services::ServiceError;
use crate::utils::{CredentialHasher, Password};

/// Sign-up input after request validation.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: Password,
    pub first_name: String,
    pub last_name: String,
    pub org_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationOutcome {
    pub user_id: Uuid,
    pub org_id: Uuid,
}

/// Creates a user, the organization it owns and its admin membership in
/// one unit of work.
#[derive(Clone)]
pub struct RegistrationService {
    store: Arc<dyn Store>,
    hasher: CredentialHasher,
}

fn classify(err: StoreError) -> ServiceError {
    match err {
        StoreError::DuplicateEmail => ServiceError::DuplicateEmail,
        other => ServiceError::Transaction(other),
    }
}

async fn provision(
    uow: &mut dyn UnitOfWork,
    registration: &Registration,
    password_hash: String,
) -> Result<RegistrationOutcome, StoreError> {
    let user = uow
        .insert_user(&NewUser {
            email: registration.email.clone(),
            password_hash,
            first_name: registration.first_name.clone(),
            last_name: registration.last_name.clone(),
        })
        .await?;

    let organization = uow
        .insert_organization(&NewOrganization {
            name: registration.org_name.clone(),
            owner_user_id: user.id,
        })
        .await?;

    uow.insert_membership(&NewStaffMembership::founding_admin(organization.id, user.id))
        .await?;

    Ok(RegistrationOutcome {
        user_id: user.id,
        org_id: organization.id,
    })
}

impl RegistrationService {
    pub fn new(store: Arc<dyn Store>, hasher: CredentialHasher) -> Self {
        Self { store, hasher }
    }

    #[instrument(skip_all)]
    pub async fn register(
        &self,
        registration: Registration,
    ) -> Result<RegistrationOutcome, ServiceError> {
        let result = self.run(registration).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(ServiceError::DuplicateEmail) => "duplicate_email",
            Err(_) => "error",
        };
        metrics::record_registration(outcome);
        result
    }

    async fn run(&self, registration: Registration) -> Result<RegistrationOutcome, ServiceError> {
        let hasher = self.hasher.clone();
        let password = registration.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Hashing task failed: {}", e)))??
            .into_string();

        let mut uow = self.store.begin().await.map_err(classify)?;

        match provision(uow.as_mut(), &registration, password_hash).await {
            Ok(outcome) => {
                uow.commit().await.map_err(classify)?;
                tracing::info!(
                    user_id = %outcome.user_id,
                    org_id = %outcome.org_id,
                    "Registered user with new organization"
                );
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    tracing::error!(error = %rollback_err, "Rollback after failed registration failed");
                }
                Err(classify(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HashingConfig;
    use crate::models::Role;
    use crate::services::store::{FailPoint, MemoryStore};

    fn service(store: &MemoryStore) -> RegistrationService {
        let hasher = CredentialHasher::new(&HashingConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();
        RegistrationService::new(Arc::new(store.clone()), hasher)
    }

    fn registration(email: &str) -> Registration {
        Registration {
            email: email.to_string(),
            password: Password::new("Secretpass1".to_string()),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            org_name: "Acme".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_creates_three_linked_rows() {
        let store = MemoryStore::default();
        let outcome = service(&store).register(registration("a@x.com")).await.unwrap();

        let users = store.users();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, outcome.user_id);
        assert!(users[0].is_active);
        assert_eq!(users[0].auth_provider, "email");
        assert!(users[0].password_hash.starts_with("$argon2id$"));

        let orgs = store.organizations();
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].id, outcome.org_id);
        assert_eq!(orgs[0].owner_user_id, outcome.user_id);
        assert!(orgs[0].slug.starts_with("acme-"));

        let staff = store.memberships();
        assert_eq!(staff.len(), 1);
        assert_eq!(staff[0].user_id, outcome.user_id);
        assert_eq!(staff[0].org_id, outcome.org_id);
        assert_eq!(staff[0].role, Role::Admin);
        assert!(staff[0].permissions.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::default();
        let service = service(&store);
        service.register(registration("a@x.com")).await.unwrap();

        let result = service.register(registration("a@x.com")).await;
        assert!(matches!(result, Err(ServiceError::DuplicateEmail)));
        assert_eq!(store.users().len(), 1);
        assert_eq!(store.organizations().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_at_any_step_leaves_nothing() {
        for point in [
            FailPoint::InsertUser,
            FailPoint::InsertOrganization,
            FailPoint::InsertMembership,
            FailPoint::Commit,
        ] {
            let store = MemoryStore::default();
            store.fail_at(point);

            let result = service(&store).register(registration("a@x.com")).await;
            assert!(
                matches!(result, Err(ServiceError::Transaction(_))),
                "{point:?} should fail the transaction"
            );
            assert!(store.users().is_empty(), "{point:?} left a user");
            assert!(store.organizations().is_empty(), "{point:?} left an org");
            assert!(store.memberships().is_empty(), "{point:?} left a membership");
        }
    }

    #[tokio::test]
    async fn test_begin_failure_is_transaction_failure() {
        let store = MemoryStore::default();
        store.fail_at(FailPoint::Begin);

        let result = service(&store).register(registration("a@x.com")).await;
        assert!(matches!(result, Err(ServiceError::Transaction(_))));
    }

    #[tokio::test]
    async fn test_concurrent_same_email_commits_once() {
        let store = MemoryStore::default();
        let service = service(&store);

        let (first, second) = tokio::join!(
            service.register(registration("race@x.com")),
            service.register(registration("race@x.com")),
        );

        assert_eq!(
            [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
            1
        );
        assert_eq!(store.users().len(), 1);
        assert_eq!(store.organizations().len(), 1);
        assert_eq!(store.memberships().len(), 1);
    }
}
