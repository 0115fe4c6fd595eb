//! Worker configuration

use activity_client::{ClientConfig, RetryPolicy, DEFAULT_BROKER_ADDRESS};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Worker configuration.
///
/// Keys map one-to-one to environment variables (`WAIT_SLEEP_TIME`,
/// `HEARTBEAT_INTERVAL`, `BROKER_ADDRESS`, ...). Durations are in seconds
/// unless the key says otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Delay before claiming again after an empty claim
    pub wait_sleep_time: u64,
    /// Heartbeat cadence while a task is in flight
    pub heartbeat_interval: u64,
    /// Orchestrator address
    pub broker_address: String,
    /// Transport deadline for heartbeat and report calls
    pub request_timeout: u64,
    /// Transport deadline for a claim, above the broker's long-poll window
    pub claim_timeout: u64,
    /// Retries of a throttled broker call
    pub throttle_max_retries: u32,
    /// Cap on one throttling backoff sleep, in milliseconds
    pub throttle_max_sleep_ms: u64,
    /// Retries of a broker call that failed in transport
    pub transport_retries: u32,
    /// Worker identity reported on claims; generated when absent
    pub worker_name: Option<String>,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        WorkerConfig {
            wait_sleep_time: 2,
            heartbeat_interval: 60,
            broker_address: DEFAULT_BROKER_ADDRESS.to_string(),
            request_timeout: 5,
            claim_timeout: 65,
            throttle_max_retries: retry.max_retries,
            throttle_max_sleep_ms: retry.max_sleep.as_millis() as u64,
            transport_retries: retry.transport_retries,
            worker_name: None,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from an optional YAML file, overridden by the
    /// process environment
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Like [`WorkerConfig::load`], reading variables from `env` instead of
    /// the process environment when given
    pub fn load_with_env(
        path: Option<&str>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }

        let config: WorkerConfig = builder
            .add_source(Environment::default().try_parsing(true).source(env))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval == 0 {
            return Err(ConfigError::Message(
                "heartbeat_interval must be at least 1 second".to_string(),
            ));
        }
        if self.wait_sleep_time == 0 {
            return Err(ConfigError::Message(
                "wait_sleep_time must be at least 1 second".to_string(),
            ));
        }
        if self.claim_timeout <= self.request_timeout {
            return Err(ConfigError::Message(
                "claim_timeout must exceed request_timeout".to_string(),
            ));
        }
        Ok(())
    }

    pub fn wait_sleep_duration(&self) -> Duration {
        Duration::from_secs(self.wait_sleep_time)
    }

    pub fn heartbeat_duration(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            address: self.broker_address.clone(),
            request_timeout: Duration::from_secs(self.request_timeout),
            claim_timeout: Duration::from_secs(self.claim_timeout),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.throttle_max_retries,
            max_sleep: Duration::from_millis(self.throttle_max_sleep_ms),
            transport_retries: self.transport_retries,
            ..RetryPolicy::default()
        }
    }

    /// Configured worker name, or `hostname-pid-random`
    pub fn resolve_worker_name(&self) -> String {
        if let Some(name) = &self.worker_name {
            return name.clone();
        }

        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        let random = uuid::Uuid::new_v4().simple().to_string();

        format!("{}-{}-{}", hostname, std::process::id(), &random[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.wait_sleep_duration(), Duration::from_secs(2));
        assert_eq!(config.heartbeat_duration(), Duration::from_secs(60));
        assert_eq!(config.broker_address, DEFAULT_BROKER_ADDRESS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_overrides() {
        let config = WorkerConfig::load_with_env(
            None,
            env(&[
                ("WAIT_SLEEP_TIME", "5"),
                ("HEARTBEAT_INTERVAL", "30"),
                ("BROKER_ADDRESS", "orchestrator:7480"),
                ("UNRELATED_VARIABLE", "ignored"),
            ]),
        )
        .unwrap();

        assert_eq!(config.wait_sleep_time, 5);
        assert_eq!(config.heartbeat_interval, 30);
        assert_eq!(config.broker_address, "orchestrator:7480");
        assert_eq!(config.request_timeout, 5);
    }

    #[test]
    fn test_file_then_environment() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "heartbeat_interval: 10").unwrap();
        writeln!(file, "worker_name: las-ingest-1").unwrap();
        writeln!(file, "log_json: true").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config =
            WorkerConfig::load_with_env(Some(&path), env(&[("HEARTBEAT_INTERVAL", "20")])).unwrap();

        assert_eq!(config.heartbeat_interval, 20);
        assert_eq!(config.worker_name.as_deref(), Some("las-ingest-1"));
        assert!(config.log_json);
        assert_eq!(config.wait_sleep_time, 2);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = WorkerConfig::load_with_env(None, env(&[("HEARTBEAT_INTERVAL", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_worker_name_generation() {
        let config = WorkerConfig::default();
        let name = config.resolve_worker_name();
        assert!(name.contains(&std::process::id().to_string()));

        let named = WorkerConfig {
            worker_name: Some("worker-7".to_string()),
            ..WorkerConfig::default()
        };
        assert_eq!(named.resolve_worker_name(), "worker-7");
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = WorkerConfig {
            throttle_max_retries: 10,
            throttle_max_sleep_ms: 500,
            ..WorkerConfig::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 10);
        assert_eq!(policy.max_sleep, Duration::from_millis(500));
    }
}
