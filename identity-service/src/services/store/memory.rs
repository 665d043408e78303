//! In-process [`Store`] used by tests and local experiments.
//!
//! Writes made through a unit of work are staged privately and only merged
//! into the shared tables on commit, where the email uniqueness check is
//! repeated so that concurrent registrations race the same way they do on
//! the database constraint.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::{Store, StoreError, UnitOfWork};
use crate::models::{
    organization::generate_slug, NewOrganization, NewRefreshToken, NewStaffMembership, NewUser,
    Organization, PermissionMap, RefreshToken, StaffMembership, User, EMAIL_PROVIDER,
};

/// Operations that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Begin,
    InsertUser,
    InsertOrganization,
    InsertMembership,
    Commit,
    FindUser,
    FindMembership,
    InsertRefreshToken,
    HealthCheck,
}

#[derive(Debug, Default, Clone)]
struct Tables {
    users: Vec<User>,
    organizations: Vec<Organization>,
    staff: Vec<StaffMembership>,
    refresh_tokens: Vec<RefreshToken>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_points: Arc<Mutex<HashSet<FailPoint>>>,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("memory store lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(poisoned)
    }

    fn check(&self, point: FailPoint) -> Result<(), StoreError> {
        let fail_points = self.fail_points.lock().map_err(poisoned)?;
        if fail_points.contains(&point) {
            return Err(StoreError::Backend(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }

    /// Make every later call to `point` fail until cleared.
    pub fn fail_at(&self, point: FailPoint) {
        if let Ok(mut fail_points) = self.fail_points.lock() {
            fail_points.insert(point);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut fail_points) = self.fail_points.lock() {
            fail_points.clear();
        }
    }

    pub fn users(&self) -> Vec<User> {
        self.snapshot().users
    }

    pub fn organizations(&self) -> Vec<Organization> {
        self.snapshot().organizations
    }

    pub fn memberships(&self) -> Vec<StaffMembership> {
        self.snapshot().staff
    }

    pub fn refresh_tokens(&self) -> Vec<RefreshToken> {
        self.snapshot().refresh_tokens
    }

    fn snapshot(&self) -> Tables {
        self.tables().map(|t| t.clone()).unwrap_or_default()
    }

    /// Insert a committed user directly.
    pub fn seed_user(&self, user: &NewUser, is_active: bool) -> Result<User, StoreError> {
        let mut tables = self.tables()?;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let mut row = user_row(user);
        row.is_active = is_active;
        tables.users.push(row.clone());
        Ok(row)
    }

    /// Insert a committed organization directly.
    pub fn seed_organization(
        &self,
        organization: &NewOrganization,
    ) -> Result<Organization, StoreError> {
        let row = organization_row(organization);
        self.tables()?.organizations.push(row.clone());
        Ok(row)
    }

    /// Insert a committed membership directly.
    pub fn seed_membership(
        &self,
        membership: &NewStaffMembership,
    ) -> Result<StaffMembership, StoreError> {
        let mut tables = self.tables()?;
        let row = membership_row(membership);
        if tables
            .staff
            .iter()
            .any(|m| m.org_id == row.org_id && m.user_id == row.user_id)
        {
            return Err(StoreError::Backend(
                "duplicate membership for organization and user".to_string(),
            ));
        }
        tables.staff.push(row.clone());
        Ok(row)
    }
}

fn user_row(user: &NewUser) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email: user.email.clone(),
        email_verified: false,
        password_hash: user.password_hash.clone(),
        auth_provider: EMAIL_PROVIDER.to_string(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        phone: None,
        profile_image_url: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn organization_row(organization: &NewOrganization) -> Organization {
    let now = Utc::now();
    Organization {
        id: Uuid::new_v4(),
        name: organization.name.clone(),
        slug: generate_slug(&organization.name),
        owner_user_id: organization.owner_user_id,
        created_at: now,
        updated_at: now,
    }
}

fn membership_row(membership: &NewStaffMembership) -> StaffMembership {
    let now = Utc::now();
    StaffMembership {
        id: Uuid::new_v4(),
        org_id: membership.org_id,
        user_id: membership.user_id,
        role: membership.role.clone(),
        permissions: membership.permissions.clone(),
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        self.check(FailPoint::Begin)?;
        Ok(Box::new(MemoryUnitOfWork {
            store: self.clone(),
            staged: Tables::default(),
        }))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.check(FailPoint::FindUser)?;
        Ok(self.tables()?.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_first_membership(
        &self,
        user_id: Uuid,
    ) -> Result<Option<StaffMembership>, StoreError> {
        self.check(FailPoint::FindMembership)?;
        Ok(self
            .tables()?
            .staff
            .iter()
            .filter(|m| m.user_id == user_id)
            .min_by_key(|m| m.created_at)
            .cloned())
    }

    async fn find_membership(
        &self,
        user_id: Uuid,
        org_id: Uuid,
    ) -> Result<Option<StaffMembership>, StoreError> {
        self.check(FailPoint::FindMembership)?;
        Ok(self
            .tables()?
            .staff
            .iter()
            .find(|m| m.user_id == user_id && m.org_id == org_id)
            .cloned())
    }

    async fn list_memberships(&self, org_id: Uuid) -> Result<Vec<StaffMembership>, StoreError> {
        Ok(self
            .tables()?
            .staff
            .iter()
            .filter(|m| m.org_id == org_id)
            .cloned()
            .collect())
    }

    async fn update_permissions(
        &self,
        org_id: Uuid,
        staff_id: Uuid,
        permissions: &PermissionMap,
    ) -> Result<Option<StaffMembership>, StoreError> {
        let mut tables = self.tables()?;
        Ok(tables
            .staff
            .iter_mut()
            .find(|m| m.id == staff_id && m.org_id == org_id)
            .map(|m| {
                m.permissions = permissions.clone();
                m.updated_at = Utc::now();
                m.clone()
            }))
    }

    async fn insert_refresh_token(
        &self,
        token: &NewRefreshToken,
    ) -> Result<RefreshToken, StoreError> {
        self.check(FailPoint::InsertRefreshToken)?;
        let row = RefreshToken {
            id: Uuid::new_v4(),
            user_id: token.user_id,
            token_hash: token.token_hash.clone(),
            expires_at: token.expires_at,
            created_at: Utc::now(),
        };
        self.tables()?.refresh_tokens.push(row.clone());
        Ok(row)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.check(FailPoint::HealthCheck)
    }
}

pub struct MemoryUnitOfWork {
    store: MemoryStore,
    staged: Tables,
}

impl MemoryUnitOfWork {
    fn email_taken(&self, email: &str) -> Result<bool, StoreError> {
        let committed = self.store.tables()?.users.iter().any(|u| u.email == email);
        Ok(committed || self.staged.users.iter().any(|u| u.email == email))
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn insert_user(&mut self, user: &NewUser) -> Result<User, StoreError> {
        self.store.check(FailPoint::InsertUser)?;
        if self.email_taken(&user.email)? {
            return Err(StoreError::DuplicateEmail);
        }
        let row = user_row(user);
        self.staged.users.push(row.clone());
        Ok(row)
    }

    async fn insert_organization(
        &mut self,
        organization: &NewOrganization,
    ) -> Result<Organization, StoreError> {
        self.store.check(FailPoint::InsertOrganization)?;
        let row = organization_row(organization);
        self.staged.organizations.push(row.clone());
        Ok(row)
    }

    async fn insert_membership(
        &mut self,
        membership: &NewStaffMembership,
    ) -> Result<StaffMembership, StoreError> {
        self.store.check(FailPoint::InsertMembership)?;
        let row = membership_row(membership);
        self.staged.staff.push(row.clone());
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.store.check(FailPoint::Commit)?;
        let MemoryUnitOfWork { store, staged } = *self;

        let mut tables = store.tables()?;
        if staged
            .users
            .iter()
            .any(|s| tables.users.iter().any(|u| u.email == s.email))
        {
            return Err(StoreError::DuplicateEmail);
        }

        tables.users.extend(staged.users);
        tables.organizations.extend(staged.organizations);
        tables.staff.extend(staged.staff);
        tables.refresh_tokens.extend(staged.refresh_tokens);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
