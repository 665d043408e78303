//! Storage seam for the identity core.
//!
//! [`Store`] covers single-statement reads and writes. Multi-row writes that
//! must land together go through a [`UnitOfWork`] obtained from
//! [`Store::begin`]; nothing staged in a unit of work is visible to other
//! callers until [`UnitOfWork::commit`] succeeds, and dropping an
//! uncommitted unit of work discards it.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    NewOrganization, NewRefreshToken, NewStaffMembership, NewUser, Organization, PermissionMap,
    PermissionMapError, RefreshToken, StaffMembership, User,
};

pub use memory::{FailPoint, MemoryStore};
pub use postgres::PgStore;

/// Unique constraint guarding `users.email`.
pub const USERS_EMAIL_KEY: &str = "users_email_key";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Malformed permission document: {0}")]
    MalformedPermissions(#[from] PermissionMapError),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() && db_err.constraint() == Some(USERS_EMAIL_KEY) {
                return StoreError::DuplicateEmail;
            }
        }
        StoreError::Database(err)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Open a unit of work for an atomic multi-row write.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Oldest membership of `user_id`, used to pick the organization a login acts in.
    async fn find_first_membership(
        &self,
        user_id: Uuid,
    ) -> Result<Option<StaffMembership>, StoreError>;

    async fn find_membership(
        &self,
        user_id: Uuid,
        org_id: Uuid,
    ) -> Result<Option<StaffMembership>, StoreError>;

    async fn list_memberships(&self, org_id: Uuid) -> Result<Vec<StaffMembership>, StoreError>;

    /// Replace the permission map of membership `staff_id` in `org_id`.
    /// Returns `None` when no such membership exists in that organization.
    async fn update_permissions(
        &self,
        org_id: Uuid,
        staff_id: Uuid,
        permissions: &PermissionMap,
    ) -> Result<Option<StaffMembership>, StoreError>;

    async fn insert_refresh_token(
        &self,
        token: &NewRefreshToken,
    ) -> Result<RefreshToken, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UnitOfWork: Send {
    async fn insert_user(&mut self, user: &NewUser) -> Result<User, StoreError>;

    async fn insert_organization(
        &mut self,
        organization: &NewOrganization,
    ) -> Result<Organization, StoreError>;

    async fn insert_membership(
        &mut self,
        membership: &NewStaffMembership,
    ) -> Result<StaffMembership, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
