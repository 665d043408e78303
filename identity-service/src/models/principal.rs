use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Role;

/// The authenticated identity attached to one request. Built only from a
/// validated access token and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Principal {
    pub user_id: Uuid,
    pub org_id: Option<Uuid>,
    #[schema(value_type = String, example = "admin")]
    pub role: Role,
}

impl Principal {
    /// Authenticated user without any organization membership.
    pub fn guest(user_id: Uuid) -> Self {
        Self {
            user_id,
            org_id: None,
            role: Role::Guest,
        }
    }

    /// Organization the principal may act in, if any. Guests never have one.
    pub fn affiliation(&self) -> Option<Uuid> {
        match self.role {
            Role::Guest => None,
            _ => self.org_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_has_no_affiliation() {
        let guest = Principal::guest(Uuid::new_v4());
        assert_eq!(guest.affiliation(), None);

        let spoofed = Principal {
            org_id: Some(Uuid::new_v4()),
            ..guest
        };
        assert_eq!(spoofed.affiliation(), None);
    }

    #[test]
    fn test_member_affiliation() {
        let org_id = Uuid::new_v4();
        let staff = Principal {
            user_id: Uuid::new_v4(),
            org_id: Some(org_id),
            role: Role::Staff,
        };
        assert_eq!(staff.affiliation(), Some(org_id));
    }
}
