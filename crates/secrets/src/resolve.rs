//! The startup resolution pass over a fixed, ordered set of secret names.

use tracing::{info, warn};

use crate::error::SecretError;
use crate::store::SecretStore;

/// What to do when a single secret cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolvePolicy {
    /// Log a warning, leave the value unset, and continue with the
    /// remaining names. Downstream consumers see the gap as their own
    /// auth failure.
    #[default]
    FailOpen,
    /// Abort on the first fetch error.
    FailFast,
}

/// Fills in environment variables that are unset, in input order, from the
/// secret store. Values already present in the environment win and cause
/// no remote call. Without a project id the whole pass is a no-op.
///
/// Runs once during single-threaded startup, before any session exists;
/// nothing else is reading or writing the environment concurrently.
pub async fn resolve_missing(
    store: &dyn SecretStore,
    project_id: Option<&str>,
    names: &[&str],
    policy: ResolvePolicy,
) -> Result<(), SecretError> {
    let Some(project_id) = project_id.filter(|p| !p.is_empty()) else {
        warn!("GCP_PROJECT not set, skipping Secret Manager fetch");
        return Ok(());
    };

    for name in names {
        if std::env::var(name).is_ok_and(|v| !v.is_empty()) {
            continue;
        }
        match store.access_latest(project_id, name).await {
            Ok(value) => {
                unsafe { std::env::set_var(name, &value) };
                info!("loaded {name} from Secret Manager");
            }
            Err(error) => match policy {
                ResolvePolicy::FailOpen => {
                    warn!("failed to load {name} from Secret Manager: {error}");
                }
                ResolvePolicy::FailFast => return Err(error),
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serial_test::serial;
    use std::collections::{HashMap, HashSet};
    use std::env;
    use std::sync::Mutex;

    struct MockStore {
        values: HashMap<String, String>,
        failing: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl MockStore {
        fn new(values: &[(&str, &str)], failing: &[&str]) -> Self {
            Self {
                values: values
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                failing: failing.iter().map(|k| k.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SecretStore for MockStore {
        async fn access_latest(
            &self,
            _project_id: &str,
            name: &str,
        ) -> Result<String, SecretError> {
            self.calls.lock().unwrap().push(name.to_string());
            if self.failing.contains(name) {
                return Err(SecretError::Status {
                    name: name.to_string(),
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                });
            }
            self.values
                .get(name)
                .cloned()
                .ok_or_else(|| SecretError::Status {
                    name: name.to_string(),
                    status: reqwest::StatusCode::NOT_FOUND,
                })
        }
    }

    fn clear(names: &[&str]) {
        for name in names {
            unsafe { env::remove_var(name) };
        }
    }

    #[tokio::test]
    #[serial]
    async fn preset_values_cause_no_store_calls() {
        let names = ["RESOLVE_TEST_A", "RESOLVE_TEST_B"];
        clear(&names);
        unsafe {
            env::set_var("RESOLVE_TEST_A", "already-here");
            env::set_var("RESOLVE_TEST_B", "me-too");
        }

        let store = MockStore::new(&[], &[]);
        resolve_missing(&store, Some("demo"), &names, ResolvePolicy::FailOpen)
            .await
            .unwrap();

        assert!(store.calls().is_empty());
        assert_eq!(env::var("RESOLVE_TEST_A").unwrap(), "already-here");
        clear(&names);
    }

    #[tokio::test]
    #[serial]
    async fn missing_project_id_skips_the_whole_pass() {
        let names = ["RESOLVE_TEST_C"];
        clear(&names);

        let store = MockStore::new(&[("RESOLVE_TEST_C", "value")], &[]);
        resolve_missing(&store, None, &names, ResolvePolicy::FailOpen)
            .await
            .unwrap();
        resolve_missing(&store, Some(""), &names, ResolvePolicy::FailOpen)
            .await
            .unwrap();

        assert!(store.calls().is_empty());
        assert!(env::var("RESOLVE_TEST_C").is_err());
    }

    #[tokio::test]
    #[serial]
    async fn fetched_values_land_in_the_environment() {
        let names = ["RESOLVE_TEST_D"];
        clear(&names);

        let store = MockStore::new(&[("RESOLVE_TEST_D", "s3cr3t")], &[]);
        resolve_missing(&store, Some("demo"), &names, ResolvePolicy::FailOpen)
            .await
            .unwrap();

        assert_eq!(store.calls(), vec!["RESOLVE_TEST_D"]);
        assert_eq!(env::var("RESOLVE_TEST_D").unwrap(), "s3cr3t");
        clear(&names);
    }

    #[tokio::test]
    #[serial]
    async fn one_failure_does_not_stop_later_names() {
        let names = [
            "RESOLVE_TEST_E",
            "RESOLVE_TEST_F",
            "RESOLVE_TEST_G",
            "RESOLVE_TEST_H",
        ];
        clear(&names);

        // Mirrors the bootstrap scenario: one key fetchable, one failing,
        // two more fetchable after the failure.
        let store = MockStore::new(
            &[
                ("RESOLVE_TEST_E", "abc"),
                ("RESOLVE_TEST_F", "x"),
                ("RESOLVE_TEST_G", "y"),
            ],
            &["RESOLVE_TEST_H"],
        );
        let ordered = [
            "RESOLVE_TEST_E",
            "RESOLVE_TEST_F",
            "RESOLVE_TEST_G",
            "RESOLVE_TEST_H",
        ];
        resolve_missing(&store, Some("demo"), &ordered, ResolvePolicy::FailOpen)
            .await
            .unwrap();

        assert_eq!(store.calls(), ordered);
        assert_eq!(env::var("RESOLVE_TEST_E").unwrap(), "abc");
        assert_eq!(env::var("RESOLVE_TEST_F").unwrap(), "x");
        assert_eq!(env::var("RESOLVE_TEST_G").unwrap(), "y");
        assert!(env::var("RESOLVE_TEST_H").is_err());
        clear(&names);
    }

    #[tokio::test]
    #[serial]
    async fn failure_in_the_middle_preserves_order() {
        let names = ["RESOLVE_TEST_I", "RESOLVE_TEST_J", "RESOLVE_TEST_K"];
        clear(&names);

        let store = MockStore::new(
            &[("RESOLVE_TEST_I", "1"), ("RESOLVE_TEST_K", "3")],
            &["RESOLVE_TEST_J"],
        );
        resolve_missing(&store, Some("demo"), &names, ResolvePolicy::FailOpen)
            .await
            .unwrap();

        assert_eq!(store.calls(), names);
        assert!(env::var("RESOLVE_TEST_J").is_err());
        assert_eq!(env::var("RESOLVE_TEST_K").unwrap(), "3");
        clear(&names);
    }

    #[tokio::test]
    #[serial]
    async fn fail_fast_aborts_on_the_first_error() {
        let names = ["RESOLVE_TEST_L", "RESOLVE_TEST_M"];
        clear(&names);

        let store = MockStore::new(&[("RESOLVE_TEST_M", "later")], &["RESOLVE_TEST_L"]);
        let result = resolve_missing(&store, Some("demo"), &names, ResolvePolicy::FailFast).await;

        assert!(matches!(
            result,
            Err(SecretError::Status { ref name, .. }) if name == "RESOLVE_TEST_L"
        ));
        assert_eq!(store.calls(), vec!["RESOLVE_TEST_L"]);
        assert!(env::var("RESOLVE_TEST_M").is_err());
    }
}
