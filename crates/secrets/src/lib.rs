//! Startup credential resolution against Google Secret Manager.
//!
//! The process environment is the source of truth: values already set are
//! never fetched. Anything missing is read from Secret Manager (latest
//! version) and written back into the environment for later readers. The
//! default policy fails open — a key that cannot be fetched is logged and
//! left unset, and downstream consumers surface the gap as their own auth
//! errors.

pub mod error;
pub mod resolve;
pub mod store;

pub use error::SecretError;
pub use resolve::{ResolvePolicy, resolve_missing};
pub use store::{SecretManagerClient, SecretStore};
