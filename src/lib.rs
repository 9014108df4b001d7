// Tenanted - database-per-tenant lifecycle management
//
// This library resolves tenant database names from a template, scans the
// server catalog for existing tenants, and coordinates provisioning across
// processes with advisory readiness locks.

// Re-export core functionality
pub use tenanted_db::*;

// Re-export the async runtime used by the manager
pub use tokio;
