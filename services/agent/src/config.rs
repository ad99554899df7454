use std::fmt;
use std::net::SocketAddr;

/// Environment variable that gates Secret Manager resolution.
pub const GCP_PROJECT_VAR: &str = "GCP_PROJECT";

/// Credentials resolved at startup, in resolution order.
pub const SECRET_KEYS: [&str; 4] = [
    "LIVEKIT_URL",
    "LIVEKIT_API_KEY",
    "LIVEKIT_API_SECRET",
    "GOOGLE_API_KEY",
];

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
///
/// Built once, after secret resolution has had its chance to fill in
/// missing values, and shared read-only with every session.
#[derive(Clone)]
pub struct Settings {
    pub bind_address: SocketAddr,
    pub livekit_url: String,
    pub livekit_api_key: String,
    pub livekit_api_secret: String,
    pub google_api_key: String,
    pub gcp_project: Option<String>,
    pub agent_identity: String,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("bind_address", &self.bind_address)
            .field("livekit_url", &self.livekit_url)
            .field("livekit_api_key", &self.livekit_api_key)
            .field("livekit_api_secret", &"[REDACTED]")
            .field("google_api_key", &"[REDACTED]")
            .field("gcp_project", &self.gcp_project)
            .field("agent_identity", &self.agent_identity)
            .finish()
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
}

impl Settings {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let livekit_url = required("LIVEKIT_URL")?;
        let livekit_api_key = required("LIVEKIT_API_KEY")?;
        let livekit_api_secret = required("LIVEKIT_API_SECRET")?;
        let google_api_key = required("GOOGLE_API_KEY")?;

        let gcp_project = std::env::var(GCP_PROJECT_VAR).ok().filter(|v| !v.is_empty());

        let agent_identity =
            std::env::var("AGENT_IDENTITY").unwrap_or_else(|_| "bamboo-agent".to_string());

        Ok(Self {
            bind_address,
            livekit_url,
            livekit_api_key,
            livekit_api_secret,
            google_api_key,
            gcp_project,
            agent_identity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("BIND_ADDRESS");
            env::remove_var("LIVEKIT_URL");
            env::remove_var("LIVEKIT_API_KEY");
            env::remove_var("LIVEKIT_API_SECRET");
            env::remove_var("GOOGLE_API_KEY");
            env::remove_var("GCP_PROJECT");
            env::remove_var("AGENT_IDENTITY");
        }
    }

    fn set_minimal_env() {
        unsafe {
            env::set_var("LIVEKIT_URL", "wss://example.livekit.cloud");
            env::set_var("LIVEKIT_API_KEY", "api-key");
            env::set_var("LIVEKIT_API_SECRET", "api-secret");
            env::set_var("GOOGLE_API_KEY", "google-key");
        }
    }

    #[test]
    fn config_error_display() {
        let missing = ConfigError::MissingVar("LIVEKIT_URL".to_string());
        assert_eq!(
            format!("{}", missing),
            "Missing environment variable: LIVEKIT_URL"
        );

        let invalid = ConfigError::InvalidValue("BIND_ADDRESS".to_string(), "bad".to_string());
        assert_eq!(
            format!("{}", invalid),
            "Invalid value for environment variable BIND_ADDRESS: bad"
        );
    }

    #[test]
    #[serial]
    fn from_env_minimal() {
        clear_env_vars();
        set_minimal_env();

        let settings = Settings::from_env().expect("settings should load");

        assert_eq!(settings.bind_address.to_string(), "0.0.0.0:8080");
        assert_eq!(settings.livekit_url, "wss://example.livekit.cloud");
        assert_eq!(settings.google_api_key, "google-key");
        assert_eq!(settings.gcp_project, None);
        assert_eq!(settings.agent_identity, "bamboo-agent");
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn from_env_custom_values() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:9090");
            env::set_var("GCP_PROJECT", "demo");
            env::set_var("AGENT_IDENTITY", "front-desk");
        }

        let settings = Settings::from_env().expect("settings should load");

        assert_eq!(settings.bind_address.to_string(), "127.0.0.1:9090");
        assert_eq!(settings.gcp_project.as_deref(), Some("demo"));
        assert_eq!(settings.agent_identity, "front-desk");
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn from_env_invalid_bind_address() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-an-address");
        }

        let err = Settings::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            other => panic!("expected InvalidValue, got {other:?}"),
        }
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn from_env_missing_credentials() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::remove_var("GOOGLE_API_KEY");
        }

        let err = Settings::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(name) => assert_eq!(name, "GOOGLE_API_KEY"),
            other => panic!("expected MissingVar, got {other:?}"),
        }
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn debug_redacts_secrets() {
        clear_env_vars();
        set_minimal_env();

        let settings = Settings::from_env().expect("settings should load");
        let rendered = format!("{settings:?}");

        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("api-secret"));
        assert!(!rendered.contains("google-key"));
        clear_env_vars();
    }

    #[test]
    fn secret_keys_resolution_order() {
        assert_eq!(
            SECRET_KEYS,
            [
                "LIVEKIT_URL",
                "LIVEKIT_API_KEY",
                "LIVEKIT_API_SECRET",
                "GOOGLE_API_KEY"
            ]
        );
    }
}
