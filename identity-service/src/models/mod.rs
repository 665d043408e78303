pub mod organization;
pub mod principal;
pub mod refresh_token;
pub mod staff;
pub mod user;

pub use organization::{NewOrganization, Organization};
pub use principal::Principal;
pub use refresh_token::{NewRefreshToken, RefreshToken, REFRESH_TOKEN_TTL_DAYS};
pub use staff::{NewStaffMembership, PermissionMap, PermissionMapError, Role, StaffMembership};
pub use user::{NewUser, User, EMAIL_PROVIDER};
