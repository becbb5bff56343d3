//! Worker configuration from `FLOWRUN_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::app::dispatcher::DispatchSettings;
use crate::app::worker_loop::{PoisonPolicy, RunMode};
use crate::domain::ModelChoice;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Required by the binary; in-memory setups leave it unset.
    pub database_url: Option<String>,
    pub queue_name: String,
    pub visibility_timeout: Duration,
    pub agent_timeout: Duration,
    pub idle_delay: Duration,
    pub agent_url: String,
    pub artifact_root: PathBuf,
    pub poison_policy: PoisonPolicy,
    pub run_mode: RunMode,
    pub default_model: ModelChoice,
    /// File to read the analysis template from; `None` uses the built-in one.
    pub analysis_template: Option<PathBuf>,
    pub context_injection: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            queue_name: "flow_tester_test_runs".to_string(),
            visibility_timeout: Duration::from_secs(960),
            agent_timeout: Duration::from_secs(900),
            idle_delay: Duration::from_secs(10),
            agent_url: "http://127.0.0.1:8765".to_string(),
            artifact_root: PathBuf::from("./artifacts"),
            poison_policy: PoisonPolicy::default(),
            run_mode: RunMode::default(),
            default_model: ModelChoice::default(),
            analysis_template: None,
            context_injection: false,
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the environment, or a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let default_model = ModelChoice::new(
            get("FLOWRUN_DEFAULT_MODEL_PROVIDER").unwrap_or(defaults.default_model.provider),
            get("FLOWRUN_DEFAULT_MODEL_SLUG").unwrap_or(defaults.default_model.slug),
        );

        let config = Self {
            database_url: get("FLOWRUN_DATABASE_URL"),
            queue_name: get("FLOWRUN_QUEUE_NAME").unwrap_or(defaults.queue_name),
            visibility_timeout: seconds(&get, "FLOWRUN_VISIBILITY_TIMEOUT_SECS")?
                .unwrap_or(defaults.visibility_timeout),
            agent_timeout: seconds(&get, "FLOWRUN_AGENT_TIMEOUT_SECS")?
                .unwrap_or(defaults.agent_timeout),
            idle_delay: seconds(&get, "FLOWRUN_IDLE_DELAY_SECS")?.unwrap_or(defaults.idle_delay),
            agent_url: get("FLOWRUN_AGENT_URL").unwrap_or(defaults.agent_url),
            artifact_root: get("FLOWRUN_ARTIFACT_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifact_root),
            poison_policy: parsed(&get, "FLOWRUN_POISON_POLICY")?
                .unwrap_or(defaults.poison_policy),
            run_mode: parsed(&get, "FLOWRUN_RUN_MODE")?.unwrap_or(defaults.run_mode),
            default_model,
            analysis_template: get("FLOWRUN_ANALYSIS_TEMPLATE").map(PathBuf::from),
            context_injection: flag(&get, "FLOWRUN_CONTEXT_INJECTION")?
                .unwrap_or(defaults.context_injection),
        };
        config.validate()?;
        Ok(config)
    }

    /// The agent must give up before the message becomes visible again,
    /// otherwise a second worker picks up a task that is still running.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_name.trim().is_empty() {
            return Err(invalid("FLOWRUN_QUEUE_NAME", "must not be empty"));
        }
        if self.visibility_timeout.is_zero() {
            return Err(invalid("FLOWRUN_VISIBILITY_TIMEOUT_SECS", "must be positive"));
        }
        if self.agent_timeout.is_zero() {
            return Err(invalid("FLOWRUN_AGENT_TIMEOUT_SECS", "must be positive"));
        }
        if self.agent_timeout >= self.visibility_timeout {
            return Err(invalid(
                "FLOWRUN_AGENT_TIMEOUT_SECS",
                format!(
                    "{}s must be shorter than the visibility timeout ({}s)",
                    self.agent_timeout.as_secs(),
                    self.visibility_timeout.as_secs()
                ),
            ));
        }
        Ok(())
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("FLOWRUN_DATABASE_URL".to_string()))
    }

    pub fn dispatch_settings(&self, analysis_template: String) -> DispatchSettings {
        DispatchSettings {
            agent_timeout: self.agent_timeout,
            default_model: self.default_model.clone(),
            analysis_template,
            context_injection: self.context_injection,
        }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

fn parsed<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|raw| raw.trim().parse::<T>().map_err(|err| invalid(key, err.to_string())))
        .transpose()
}

fn seconds(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<Duration>, ConfigError> {
    Ok(parsed::<u64>(get, key)?.map(Duration::from_secs))
}

fn flag(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>, ConfigError> {
    get(key)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(key, format!("expected a boolean, got '{other}'"))),
        })
        .transpose()
}
