//! Database naming templates.
//!
//! A template such as `app_%{tenant}` maps a tenant identifier to a database
//! name, and the compiled reverse matcher maps database names found in the
//! server catalog back to tenant identifiers.

use crate::identifier::validate_tenant_name;
use crate::{TenantError, TenantResult};
use regex::Regex;
use std::fmt;

/// Placeholder substituted with the tenant identifier.
pub const TENANT_PLACEHOLDER: &str = "%{tenant}";

/// Compiled database naming template.
#[derive(Debug, Clone)]
pub struct NameTemplate {
    template: String,
    prefix: String,
    suffix: String,
    scanner: Regex,
}

impl NameTemplate {
    /// Compile a template containing exactly one `%{tenant}` placeholder.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenanted_db::NameTemplate;
    ///
    /// let template = NameTemplate::new("app_%{tenant}").unwrap();
    /// assert_eq!(template.render("acme").unwrap(), "app_acme");
    /// assert_eq!(template.match_name("app_acme").as_deref(), Some("acme"));
    /// assert_eq!(template.match_name("other_db"), None);
    /// ```
    pub fn new(template: impl Into<String>) -> TenantResult<Self> {
        let template = template.into();

        let occurrences = template.matches(TENANT_PLACEHOLDER).count();
        if occurrences != 1 {
            return Err(TenantError::MalformedTemplate(format!(
                "{template:?} must contain exactly one {TENANT_PLACEHOLDER} placeholder, found {occurrences}"
            )));
        }

        let (prefix, suffix) = template
            .split_once(TENANT_PLACEHOLDER)
            .ok_or_else(|| TenantError::MalformedTemplate(template.clone()))?;

        // (?s) so identifiers containing newlines still round-trip
        let pattern = format!(
            r"(?s)\A{}(.+){}\z",
            regex::escape(prefix),
            regex::escape(suffix)
        );
        let scanner = Regex::new(&pattern)
            .map_err(|e| TenantError::MalformedTemplate(format!("{template:?}: {e}")))?;

        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            template,
            scanner,
        })
    }

    /// The raw template string.
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Render the database name for a tenant.
    ///
    /// The identifier is validated first. Empty identifiers are rejected
    /// because the rendered name could not be matched back.
    pub fn render(&self, tenant: &str) -> TenantResult<String> {
        validate_tenant_name(tenant)?;
        if tenant.is_empty() {
            return Err(TenantError::InvalidIdentifier(tenant.to_string()));
        }

        let mut name = String::with_capacity(self.prefix.len() + tenant.len() + self.suffix.len());
        name.push_str(&self.prefix);
        name.push_str(tenant);
        name.push_str(&self.suffix);
        Ok(name)
    }

    /// Recover the tenant identifier from a database name, if the name was
    /// produced by this template.
    ///
    /// Names whose tenant part would fail validation are not matched, since
    /// [`NameTemplate::render`] could never have produced them.
    pub fn match_name(&self, candidate: &str) -> Option<String> {
        self.scanner
            .captures(candidate)
            .and_then(|captures| captures.get(1))
            .map(|tenant| tenant.as_str())
            .filter(|tenant| validate_tenant_name(tenant).is_ok())
            .map(str::to_string)
    }

    /// Whether `candidate` was produced by this template.
    pub fn matches(&self, candidate: &str) -> bool {
        self.match_name(candidate).is_some()
    }
}

impl fmt::Display for NameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

impl PartialEq for NameTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.template == other.template
    }
}

impl Eq for NameTemplate {}

/// Append a parallel test worker suffix to a database name or template.
///
/// Already suffixed names are returned unchanged.
///
/// # Examples
///
/// ```
/// use tenanted_db::workerize;
///
/// assert_eq!(workerize("app_tenant", 3), "app_tenant_3");
/// assert_eq!(workerize("app_tenant_3", 3), "app_tenant_3");
/// ```
pub fn workerize(database: &str, worker_id: impl fmt::Display) -> String {
    let suffix = format!("_{worker_id}");
    if database.ends_with(&suffix) {
        database.to_string()
    } else {
        format!("{database}{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let template = NameTemplate::new("tenanted_%{tenant}").unwrap();
        assert_eq!(template.render("acme").unwrap(), "tenanted_acme");
        assert_eq!(template.as_str(), "tenanted_%{tenant}");
    }

    #[test]
    fn test_render_validates_identifier() {
        let template = NameTemplate::new("app_%{tenant}").unwrap();
        assert!(matches!(
            template.render("foo'bar"),
            Err(TenantError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            template.render(""),
            Err(TenantError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_malformed_templates() {
        for raw in ["app_db", "%{tenant}_%{tenant}", "", "app_%{tenants"] {
            assert!(
                matches!(NameTemplate::new(raw), Err(TenantError::MalformedTemplate(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_round_trip() {
        let templates = [
            "app_%{tenant}",
            "%{tenant}",
            "%{tenant}_production",
            "db.(%{tenant})+[x]",
            "a*b?c^$|%{tenant}\\d",
        ];
        let tenants = ["acme", "foo-bar_123", "a.b", "x", "with space", "line\nbreak", "%{x}"];

        for raw in templates {
            let template = NameTemplate::new(raw).unwrap();
            for tenant in tenants {
                let name = template.render(tenant).unwrap();
                assert_eq!(
                    template.match_name(&name).as_deref(),
                    Some(tenant),
                    "template {raw:?}, tenant {tenant:?}"
                );
            }
        }
    }

    #[test]
    fn test_negative_match() {
        let template = NameTemplate::new("app_%{tenant}").unwrap();
        assert_eq!(template.match_name("other_db"), None);
        assert_eq!(template.match_name("app_"), None);
        assert_eq!(template.match_name("xapp_acme"), None);
        assert!(!template.matches("postgres"));
        assert!(template.matches("app_acme"));
    }

    #[test]
    fn test_unrenderable_names_do_not_match() {
        let template = NameTemplate::new("tenant_%{tenant}").unwrap();

        for name in ["tenant_a/b", "tenant_x'y", "tenant_q\"r", "tenant_b`t"] {
            assert_eq!(template.match_name(name), None, "{name:?} should not match");
            assert!(!template.matches(name));
        }
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let template = NameTemplate::new("app.%{tenant}").unwrap();
        assert_eq!(template.match_name("appXacme"), None);
        assert_eq!(template.match_name("app.acme").as_deref(), Some("acme"));
    }

    #[test]
    fn test_suffix_anchor() {
        let template = NameTemplate::new("%{tenant}_db").unwrap();
        assert_eq!(template.match_name("acme_db").as_deref(), Some("acme"));
        assert_eq!(template.match_name("acme_db_old"), None);
    }

    #[test]
    fn test_workerize() {
        assert_eq!(workerize("app_tenant", 3), "app_tenant_3");
        assert_eq!(workerize("app_tenant_3", 3), "app_tenant_3");
        assert_eq!(workerize("app_tenant_13", 3), "app_tenant_13_3");
        assert_eq!(workerize("app_%{tenant}", "2"), "app_%{tenant}_2");
    }
}
