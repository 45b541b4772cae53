//! Configuration loading shared by every crate in the workspace.
//!
//! Settings come from layered `config/*` files and the process environment.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Default directory for the local state file.
pub const DEFAULT_STATE_DIR: &str = "data";

/// Build the layered configuration used by all settings structs.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP__OWNER_ID=1 ./target/app`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Plain UPPER_SNAKE_CASE variables map to snake_case keys; empty ones count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Persistence settings: remote key-value credentials and the local state directory.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageSettings {
    /// R2 Storage access key ID
    pub r2_access_key_id: Option<String>,
    /// R2 Storage secret access key
    pub r2_secret_access_key: Option<String>,
    /// R2 Storage endpoint URL
    pub r2_endpoint_url: Option<String>,
    /// R2 Storage bucket name
    pub r2_bucket_name: Option<String>,

    /// Base URL of a REST key-value store (Upstash / Vercel KV)
    pub kv_rest_api_url: Option<String>,
    /// Bearer token for the REST key-value store
    pub kv_rest_api_token: Option<String>,

    /// Directory holding the local state file
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
}

fn default_state_dir() -> String {
    DEFAULT_STATE_DIR.to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            r2_access_key_id: None,
            r2_secret_access_key: None,
            r2_endpoint_url: None,
            r2_bucket_name: None,
            kv_rest_api_url: None,
            kv_rest_api_token: None,
            state_dir: default_state_dir(),
        }
    }
}

impl StorageSettings {
    /// Load storage settings from files and environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let mut settings: Self = build_config()?.try_deserialize()?;

        // The config crate occasionally misses these when APP__ variables shadow them
        env_fallback(&mut settings.r2_endpoint_url, "R2_ENDPOINT_URL");
        env_fallback(&mut settings.r2_access_key_id, "R2_ACCESS_KEY_ID");
        env_fallback(&mut settings.r2_secret_access_key, "R2_SECRET_ACCESS_KEY");
        env_fallback(&mut settings.r2_bucket_name, "R2_BUCKET_NAME");
        env_fallback(&mut settings.kv_rest_api_url, "KV_REST_API_URL");
        env_fallback(&mut settings.kv_rest_api_token, "KV_REST_API_TOKEN");

        Ok(settings)
    }

    /// Returns true when every R2 variable is present.
    #[must_use]
    pub const fn has_r2(&self) -> bool {
        self.r2_access_key_id.is_some()
            && self.r2_secret_access_key.is_some()
            && self.r2_endpoint_url.is_some()
            && self.r2_bucket_name.is_some()
    }

    /// Returns true when some, but not all, R2 variables are present.
    #[must_use]
    pub const fn has_partial_r2(&self) -> bool {
        let any = self.r2_access_key_id.is_some()
            || self.r2_secret_access_key.is_some()
            || self.r2_endpoint_url.is_some()
            || self.r2_bucket_name.is_some();
        any && !self.has_r2()
    }

    /// Returns true when both REST KV variables are present.
    #[must_use]
    pub const fn has_rest_kv(&self) -> bool {
        self.kv_rest_api_url.is_some() && self.kv_rest_api_token.is_some()
    }

    /// Returns true when exactly one REST KV variable is present.
    #[must_use]
    pub const fn has_partial_rest_kv(&self) -> bool {
        self.kv_rest_api_url.is_some() != self.kv_rest_api_token.is_some()
    }
}

fn env_fallback(field: &mut Option<String>, name: &str) {
    if field.is_some() {
        return;
    }
    if let Ok(val) = std::env::var(name) {
        if !val.is_empty() {
            *field = Some(val);
        }
    }
}
