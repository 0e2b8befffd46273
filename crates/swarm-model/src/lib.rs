// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod types;
mod provider;
mod anthropic;
mod mock;

pub use anthropic::AnthropicProvider;
pub use mock::{MockProvider, ScriptedMockProvider};
pub use provider::ModelProvider;
pub use types::*;

use anyhow::Context;
use swarm_config::ModelConfig;

/// Construct the boxed [`ModelProvider`] the kernel talks to, reading the
/// base URL / API key / model name out of the environment variables named in
/// `cfg`.
///
/// `SWARM_MODEL_PROVIDER=mock` short-circuits to [`MockProvider`] regardless
/// of the other variables, for running the kernel without network access.
pub fn from_config(cfg: &ModelConfig) -> anyhow::Result<Box<dyn ModelProvider>> {
    if std::env::var("SWARM_MODEL_PROVIDER").as_deref() == Ok("mock") {
        return Ok(Box::new(MockProvider));
    }

    let api_key = std::env::var(&cfg.api_key_env)
        .with_context(|| format!("environment variable {} is not set", cfg.api_key_env))?;
    let model_name = std::env::var(&cfg.model_name_env)
        .with_context(|| format!("environment variable {} is not set", cfg.model_name_env))?;
    let base_url = std::env::var(&cfg.base_url_env).ok();

    Ok(Box::new(AnthropicProvider::new(model_name, Some(api_key), base_url)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn from_config_mock_provider_short_circuits() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SWARM_MODEL_PROVIDER", "mock");
        let cfg = ModelConfig::default();
        let provider = from_config(&cfg).unwrap();
        assert_eq!(provider.name(), "mock");
        std::env::remove_var("SWARM_MODEL_PROVIDER");
    }

    #[test]
    fn from_config_errors_when_api_key_env_missing() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("SWARM_MODEL_PROVIDER");
        let cfg = ModelConfig { api_key_env: "SWARM_TEST_MISSING_KEY_XYZ".into(), ..ModelConfig::default() };
        std::env::remove_var(&cfg.api_key_env);
        let result = from_config(&cfg);
        assert!(result.is_err());
    }

    #[test]
    fn from_config_builds_anthropic_provider_from_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("SWARM_MODEL_PROVIDER");
        std::env::set_var("SWARM_TEST_API_KEY", "sk-test");
        std::env::set_var("SWARM_TEST_MODEL", "claude-opus-4-5");
        let cfg = ModelConfig {
            api_key_env: "SWARM_TEST_API_KEY".into(),
            model_name_env: "SWARM_TEST_MODEL".into(),
            ..ModelConfig::default()
        };
        let provider = from_config(&cfg).unwrap();
        assert_eq!(provider.name(), "anthropic");
        std::env::remove_var("SWARM_TEST_API_KEY");
        std::env::remove_var("SWARM_TEST_MODEL");
    }
}
