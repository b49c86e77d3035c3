//! Catalog helpers shared by every tenant-scoped catalog entity.

use crate::error::{VitrineError, VitrineResult};

const MAX_SLUG_LEN: usize = 96;

/// Slugs are unique per `(tenant_id, slug)` and limited to lowercase ASCII
/// letters, digits and single inner hyphens.
pub fn validate_slug(field: &str, slug: &str) -> VitrineResult<()> {
    if slug.is_empty() {
        return Err(VitrineError::validation(field, "must not be empty"));
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(VitrineError::validation(
            field,
            format!("must be at most {MAX_SLUG_LEN} characters"),
        ));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(VitrineError::validation(
            field,
            "may only contain lowercase letters, digits and hyphens",
        ));
    }
    if slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return Err(VitrineError::validation(
            field,
            "hyphens must separate words",
        ));
    }
    Ok(())
}
