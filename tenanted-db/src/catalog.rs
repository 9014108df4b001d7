//! Catalog scanning.
//!
//! Turns the database names reported by the server catalog into the set of
//! tenants that currently own a database.

use crate::template::NameTemplate;
use std::collections::BTreeSet;
use tracing::debug;

/// Recovers tenant identifiers from catalog rows.
#[derive(Debug, Clone, Copy)]
pub struct CatalogScanner<'a> {
    template: &'a NameTemplate,
}

impl<'a> CatalogScanner<'a> {
    /// Create a scanner for the given template.
    pub fn new(template: &'a NameTemplate) -> Self {
        Self { template }
    }

    /// Return the tenants whose database appears in `rows`.
    ///
    /// Rows that were not produced by the template are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenanted_db::{CatalogScanner, NameTemplate};
    ///
    /// let template = NameTemplate::new("tenant_%{tenant}").unwrap();
    /// let tenants = CatalogScanner::new(&template)
    ///     .tenant_databases(["tenant_acme", "tenant_beta", "postgres", "template0"]);
    ///
    /// assert_eq!(tenants.into_iter().collect::<Vec<_>>(), vec!["acme", "beta"]);
    /// ```
    pub fn tenant_databases<I, S>(&self, rows: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tenants: BTreeSet<String> = rows
            .into_iter()
            .filter_map(|row| self.template.match_name(row.as_ref()))
            .collect();

        debug!(
            template = %self.template,
            count = tenants.len(),
            "Scanned catalog for tenant databases"
        );
        tenants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_databases() {
        let template = NameTemplate::new("tenant_%{tenant}").unwrap();
        let scanner = CatalogScanner::new(&template);

        let tenants =
            scanner.tenant_databases(["tenant_acme", "tenant_beta", "postgres", "template0"]);

        let expected: BTreeSet<String> = ["acme", "beta"].iter().map(|s| s.to_string()).collect();
        assert_eq!(tenants, expected);
    }

    #[test]
    fn test_skips_rows_with_forbidden_tenant_characters() {
        let template = NameTemplate::new("tenant_%{tenant}").unwrap();

        let tenants = CatalogScanner::new(&template)
            .tenant_databases(["tenant_a/b", "tenant_x'y", "tenant_ok"]);

        assert_eq!(tenants.into_iter().collect::<Vec<_>>(), vec!["ok"]);
    }

    #[test]
    fn test_empty_catalog() {
        let template = NameTemplate::new("tenant_%{tenant}").unwrap();
        let rows: Vec<String> = Vec::new();
        assert!(CatalogScanner::new(&template).tenant_databases(rows).is_empty());
    }

    #[test]
    fn test_unordered_owned_rows() {
        let template = NameTemplate::new("%{tenant}_prod").unwrap();
        let rows = vec![
            "zeta_prod".to_string(),
            "alpha_prod".to_string(),
            "alpha_staging".to_string(),
        ];

        let tenants = CatalogScanner::new(&template).tenant_databases(rows);
        assert_eq!(tenants.into_iter().collect::<Vec<_>>(), vec!["alpha", "zeta"]);
    }
}
