//! Tenant identifier validation.
//!
//! Tenant identifiers end up inside database names, lock file paths and SQL
//! statements, so anything that could act as a path separator or a quote is
//! rejected before the identifier is used anywhere.

use crate::{TenantError, TenantResult};

/// Characters never allowed in a tenant identifier.
pub const FORBIDDEN_CHARS: [char; 4] = ['/', '\'', '"', '`'];

/// Validate a tenant identifier.
///
/// # Examples
///
/// ```
/// use tenanted_db::validate_tenant_name;
///
/// assert!(validate_tenant_name("foo-bar_123").is_ok());
/// assert!(validate_tenant_name("foo'bar").is_err());
/// ```
pub fn validate_tenant_name(tenant_name: &str) -> TenantResult<()> {
    if tenant_name.contains(FORBIDDEN_CHARS) {
        return Err(TenantError::InvalidIdentifier(tenant_name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_common_tenant_names() {
        for name in ["foo-bar_123", "acme", "ACME.corp", "tenant 1", "ünïcødé", ""] {
            assert!(validate_tenant_name(name).is_ok(), "{name:?} should be valid");
        }
    }

    #[test]
    fn test_rejects_dangerous_tenant_names() {
        for name in ["foo'bar", "foo\"bar", "foo`bar", "../etc", "a/b", "'; DROP DATABASE x; --"] {
            let err = validate_tenant_name(name).unwrap_err();
            assert!(matches!(err, TenantError::InvalidIdentifier(_)));
            assert!(
                err.to_string()
                    .contains("Tenant name contains an invalid character")
            );
        }
    }
}
