//! Global settings, assembled once at startup from the environment.
//!
//! Per the "Global settings object" design note: a plain record constructed
//! once and passed by `Arc` reference to every component — never read from
//! module-level state at call time.

use std::sync::Arc;

use crate::error::{Error, Result};

/// Environment-injectable options recognized by the orchestrator, per the
/// external-interfaces configuration table.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub llm_profile: String,
    pub llm_region: String,
    pub llm_model_id: String,
    pub max_agents: u32,
    pub task_timeout_secs: i64,
    pub lock_timeout_secs: i64,
    pub log_level: String,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            redis_url: None,
            llm_profile: "default".to_string(),
            llm_region: "us-east-1".to_string(),
            llm_model_id: "default-model".to_string(),
            max_agents: 5,
            task_timeout_secs: 300,
            lock_timeout_secs: 300,
            log_level: "info".to_string(),
            debug: false,
        }
    }
}

impl Settings {
    /// Layer environment variables over the defaults.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();

        if let Ok(value) = std::env::var("DATABASE_URL") {
            settings.database_url = Some(value);
        }

        if let Ok(value) = std::env::var("REDIS_URL") {
            settings.redis_url = Some(value);
        }

        if let Ok(value) = std::env::var("LLM_PROFILE") {
            settings.llm_profile = value;
        }

        if let Ok(value) = std::env::var("LLM_REGION") {
            settings.llm_region = value;
        }

        if let Ok(value) = std::env::var("LLM_MODEL_ID") {
            settings.llm_model_id = value;
        }

        if let Ok(value) = std::env::var("MAX_AGENTS") {
            settings.max_agents = value
                .parse()
                .map_err(|e| Error::InvalidConfig(format!("invalid MAX_AGENTS: {e}")))?;
        }

        if let Ok(value) = std::env::var("TASK_TIMEOUT") {
            settings.task_timeout_secs = value
                .parse()
                .map_err(|e| Error::InvalidConfig(format!("invalid TASK_TIMEOUT: {e}")))?;
        }

        if let Ok(value) = std::env::var("LOCK_TIMEOUT") {
            settings.lock_timeout_secs = value
                .parse()
                .map_err(|e| Error::InvalidConfig(format!("invalid LOCK_TIMEOUT: {e}")))?;
        }

        if let Ok(value) = std::env::var("LOG_LEVEL") {
            settings.log_level = value;
        }

        if let Ok(value) = std::env::var("DEBUG") {
            settings.debug = value
                .parse()
                .map_err(|e| Error::InvalidConfig(format!("invalid DEBUG: {e}")))?;
        }

        Ok(settings)
    }

    /// Wrap in an `Arc` for cheap sharing across worker tasks.
    #[must_use]
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_when_env_unset() {
        for key in ["MAX_AGENTS", "TASK_TIMEOUT", "LOCK_TIMEOUT", "DEBUG"] {
            std::env::remove_var(key);
        }
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.max_agents, 5);
        assert!(!settings.debug);
    }

    #[test]
    #[serial]
    fn env_overrides_defaults() {
        std::env::set_var("MAX_AGENTS", "12");
        std::env::set_var("DEBUG", "true");
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.max_agents, 12);
        assert!(settings.debug);
        std::env::remove_var("MAX_AGENTS");
        std::env::remove_var("DEBUG");
    }
}
