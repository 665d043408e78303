//! Organization model - the tenant created alongside its first user.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub owner_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
    pub owner_user_id: Uuid,
}

/// Lowercase `name`, collapsing every run of non-alphanumerics into one `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "org".to_string()
    } else {
        slug.to_string()
    }
}

/// Slug with a random suffix so that organizations sharing a name stay unique.
pub fn generate_slug(name: &str) -> String {
    format!("{}-{:08x}", slugify(name), rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("Acme"), "acme");
        assert_eq!(slugify("  Acme   Widgets, Inc. "), "acme-widgets-inc");
        assert_eq!(slugify("Hello--World"), "hello-world");
    }

    #[test]
    fn test_slugify_empty_name() {
        assert_eq!(slugify(""), "org");
        assert_eq!(slugify("!!!"), "org");
    }

    #[test]
    fn test_generate_slug_adds_hex_suffix() {
        let slug = generate_slug("Acme Corp");
        let (base, suffix) = slug.rsplit_once('-').unwrap();

        assert_eq!(base, "acme-corp");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
