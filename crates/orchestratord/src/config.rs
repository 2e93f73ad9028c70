//! Daemon-level settings: [`orch_core::Settings`] layered with the CLI
//! overrides a subcommand was actually invoked with.

pub use orch_core::Settings;

/// Apply the handful of settings a CLI invocation may override, without
/// reimplementing the environment-parsing `orch_core` already owns.
pub fn apply_overrides(mut settings: Settings, max_agents: Option<u32>, redis_url: Option<String>) -> Settings {
    if let Some(max_agents) = max_agents {
        settings.max_agents = max_agents;
    }
    if let Some(redis_url) = redis_url {
        settings.redis_url = Some(redis_url);
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_only_when_present() {
        let base = Settings { max_agents: 5, redis_url: None, ..Settings::default() };

        let unchanged = apply_overrides(base.clone(), None, None);
        assert_eq!(unchanged.max_agents, 5);
        assert!(unchanged.redis_url.is_none());

        let overridden = apply_overrides(base, Some(12), Some("redis://localhost".to_string()));
        assert_eq!(overridden.max_agents, 12);
        assert_eq!(overridden.redis_url.as_deref(), Some("redis://localhost"));
    }
}
