use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

use super::{Store, StoreError, UnitOfWork};
use crate::db;
use crate::models::{
    NewOrganization, NewRefreshToken, NewStaffMembership, NewUser, Organization, PermissionMap,
    RefreshToken, StaffMembership, User,
};

/// [`Store`] backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn membership(row: db::staff::StaffRow) -> Result<StaffMembership, StoreError> {
    Ok(StaffMembership::try_from(row)?)
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self))]
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    #[instrument(skip(self, email))]
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(db::users::find_by_email(&self.pool, email).await?)
    }

    #[instrument(skip(self))]
    async fn find_first_membership(
        &self,
        user_id: Uuid,
    ) -> Result<Option<StaffMembership>, StoreError> {
        db::staff::find_first_for_user(&self.pool, user_id)
            .await?
            .map(membership)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn find_membership(
        &self,
        user_id: Uuid,
        org_id: Uuid,
    ) -> Result<Option<StaffMembership>, StoreError> {
        db::staff::find(&self.pool, user_id, org_id)
            .await?
            .map(membership)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn list_memberships(&self, org_id: Uuid) -> Result<Vec<StaffMembership>, StoreError> {
        db::staff::list_for_org(&self.pool, org_id)
            .await?
            .into_iter()
            .map(membership)
            .collect()
    }

    #[instrument(skip(self, permissions))]
    async fn update_permissions(
        &self,
        org_id: Uuid,
        staff_id: Uuid,
        permissions: &PermissionMap,
    ) -> Result<Option<StaffMembership>, StoreError> {
        db::staff::update_permissions(&self.pool, org_id, staff_id, permissions)
            .await?
            .map(membership)
            .transpose()
    }

    #[instrument(skip(self, token), fields(user_id = %token.user_id))]
    async fn insert_refresh_token(
        &self,
        token: &NewRefreshToken,
    ) -> Result<RefreshToken, StoreError> {
        Ok(db::refresh_tokens::insert(&self.pool, token).await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(db::health_check(&self.pool).await?)
    }
}

/// One open transaction. Dropping it without `commit` rolls back, which is
/// what happens when the owning request future is cancelled.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    #[instrument(skip_all)]
    async fn insert_user(&mut self, user: &NewUser) -> Result<User, StoreError> {
        Ok(db::users::insert(&mut *self.tx, user).await?)
    }

    #[instrument(skip_all, fields(owner_user_id = %organization.owner_user_id))]
    async fn insert_organization(
        &mut self,
        organization: &NewOrganization,
    ) -> Result<Organization, StoreError> {
        Ok(db::organizations::insert(&mut *self.tx, organization).await?)
    }

    #[instrument(skip_all, fields(org_id = %membership.org_id, user_id = %membership.user_id))]
    async fn insert_membership(
        &mut self,
        membership: &NewStaffMembership,
    ) -> Result<StaffMembership, StoreError> {
        let row = db::staff::insert(&mut *self.tx, membership).await?;
        Ok(StaffMembership::try_from(row)?)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        Ok(self.tx.commit().await?)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(self.tx.rollback().await?)
    }
}
