//! Startup configuration.
//!
//! A keyed collection mapping provider identity to its per-provider config,
//! plus global defaults. Deserialized from JSON (and, with the `yaml`
//! feature, YAML), then turned into immutable `Arc<ProviderConfig>` values
//! that the rest of the crate never mutates.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::display::DisplayConfig;
use crate::error::{PipelineError, Result};
use crate::provider::{Credential, ProviderConfig, ProviderId};
use crate::router::Strategy;

/// One entry of the `providers` map in the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEntry {
    pub model: String,
    #[serde(default)]
    pub api_key: Option<Credential>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub compartment_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

/// Top-level configuration file shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Configuration {
    pub providers: HashMap<ProviderId, ProviderEntry>,
    #[serde(default = "default_strategy")]
    pub default_strategy: Strategy,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub display: DisplayConfig,
}

fn default_strategy() -> Strategy {
    Strategy::All
}

fn default_timeout_ms() -> u64 {
    120_000
}

impl Configuration {
    /// Parse a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(PipelineError::Json)
    }

    /// Parse a YAML configuration document. Requires the `yaml` feature.
    #[cfg(feature = "yaml")]
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| PipelineError::InvalidConfig(format!("invalid YAML: {}", e)))
    }

    /// Build the immutable `ProviderConfig` set this configuration describes.
    ///
    /// Credentials are not resolved here — each adapter resolves its own
    /// credential lazily, so a misconfigured unused provider doesn't block
    /// startup.
    pub fn provider_configs(&self) -> Vec<Arc<ProviderConfig>> {
        self.providers
            .iter()
            .map(|(id, entry)| {
                let mut cfg = ProviderConfig::new(*id, entry.model.clone())
                    .with_temperature_and_max_tokens(entry.temperature, entry.max_tokens);
                if let Some(cred) = entry.api_key.clone() {
                    cfg = cfg.with_credential(cred);
                }
                if let Some(endpoint) = entry.endpoint.clone() {
                    cfg = cfg.with_endpoint(endpoint);
                }
                if let Some(compartment_id) = entry.compartment_id.clone() {
                    cfg = cfg.with_compartment_id(compartment_id);
                }
                Arc::new(cfg)
            })
            .collect()
    }

    /// Restrict this configuration's provider set to `subset`, per the CLI's
    /// `-p/--providers` flag. Unknown ids are silently ignored — the CLI
    /// surface validates the csv against `ProviderId::from_str` before this
    /// is called.
    pub fn restrict_to(&self, subset: &[ProviderId]) -> Configuration {
        let mut restricted = self.clone();
        restricted.providers.retain(|id, _| subset.contains(id));
        restricted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_json_config() {
        let json = r#"{
            "providers": {
                "openai": {"model": "gpt-4o", "api_key": "sk-test"}
            }
        }"#;
        let config = Configuration::from_json(json).unwrap();
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.default_strategy, Strategy::All);
        assert_eq!(config.timeout_ms, 120_000);
    }

    #[test]
    fn test_parse_env_ref_credential() {
        let json = r#"{
            "providers": {
                "anthropic": {"model": "claude-3-5-sonnet", "api_key": {"env": "ANTHROPIC_API_KEY"}}
            }
        }"#;
        let config = Configuration::from_json(json).unwrap();
        let entry = &config.providers[&ProviderId::Anthropic];
        match entry.api_key.as_ref().unwrap() {
            Credential::EnvRef { env } => assert_eq!(env, "ANTHROPIC_API_KEY"),
            _ => panic!("expected EnvRef"),
        }
    }

    #[test]
    fn test_invalid_json_is_error() {
        let result = Configuration::from_json("not json");
        assert!(result.is_err());
    }

    #[test]
    fn test_restrict_to_subset() {
        let json = r#"{
            "providers": {
                "openai": {"model": "gpt-4o"},
                "anthropic": {"model": "claude-3-5-sonnet"}
            }
        }"#;
        let config = Configuration::from_json(json).unwrap();
        let restricted = config.restrict_to(&[ProviderId::OpenAi]);
        assert_eq!(restricted.providers.len(), 1);
        assert!(restricted.providers.contains_key(&ProviderId::OpenAi));
    }

    #[test]
    fn test_provider_configs_builds_arcs() {
        let json = r#"{
            "providers": {
                "oci": {"model": "cohere.command", "compartment_id": "ocid1.x"}
            }
        }"#;
        let config = Configuration::from_json(json).unwrap();
        let built = config.provider_configs();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].compartment_id.as_deref(), Some("ocid1.x"));
    }
}
