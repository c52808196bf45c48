//! Provider identity and configuration.
//!
//! A [`ProviderId`] is the stable enumerated identity the rest of the crate
//! routes on. A [`ProviderConfig`] is built once at startup from
//! [`crate::config::Configuration`] and never mutated for the process
//! lifetime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable provider identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenAi,
    Anthropic,
    DeepSeek,
    Perplexity,
    Oci,
    Local,
}

impl ProviderId {
    /// All provider identities, in a fixed canonical order.
    pub const ALL: [ProviderId; 6] = [
        ProviderId::OpenAi,
        ProviderId::Anthropic,
        ProviderId::DeepSeek,
        ProviderId::Perplexity,
        ProviderId::Oci,
        ProviderId::Local,
    ];

    /// Wire/topic name, e.g. `"openai"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::Anthropic => "anthropic",
            ProviderId::DeepSeek => "deepseek",
            ProviderId::Perplexity => "perplexity",
            ProviderId::Oci => "oci",
            ProviderId::Local => "local",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderId::OpenAi),
            "anthropic" => Ok(ProviderId::Anthropic),
            "deepseek" => Ok(ProviderId::DeepSeek),
            "perplexity" => Ok(ProviderId::Perplexity),
            "oci" => Ok(ProviderId::Oci),
            "local" => Ok(ProviderId::Local),
            other => Err(format!("unknown provider identity: '{}'", other)),
        }
    }
}

/// A credential value: either a literal string, or a reference to an
/// environment variable to resolve at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credential {
    Direct(String),
    EnvRef { env: String },
}

impl Credential {
    /// Resolve this credential to its concrete value.
    ///
    /// `Direct` returns the literal string; `EnvRef` looks up the named
    /// environment variable and fails with [`crate::error::PipelineError::InvalidConfig`]
    /// if it isn't set.
    pub fn resolve(&self) -> crate::error::Result<String> {
        match self {
            Credential::Direct(s) => Ok(s.clone()),
            Credential::EnvRef { env } => std::env::var(env).map_err(|_| {
                crate::error::PipelineError::InvalidConfig(format!(
                    "environment variable '{}' is not set",
                    env
                ))
            }),
        }
    }
}

/// Immutable, per-process provider configuration. Constructed at startup
/// from [`crate::config::Configuration`]; never mutated afterward.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub id: ProviderId,
    pub model: String,
    pub credential: Option<Credential>,
    pub endpoint: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    /// OCI-only: the compartment identifier. Missing it is a
    /// `configuration_error` the moment the OCI adapter is invoked.
    pub compartment_id: Option<String>,
}

impl ProviderConfig {
    /// Minimal config for tests and the CLI's mock path.
    pub fn new(id: ProviderId, model: impl Into<String>) -> Self {
        Self {
            id,
            model: model.into(),
            credential: None,
            endpoint: None,
            temperature: 0.7,
            max_tokens: 2048,
            compartment_id: None,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_compartment_id(mut self, compartment_id: impl Into<String>) -> Self {
        self.compartment_id = Some(compartment_id.into());
        self
    }

    pub fn with_temperature_and_max_tokens(mut self, temperature: f64, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Resolve the credential, if any.
    pub fn resolve_credential(&self) -> crate::error::Result<Option<String>> {
        self.credential.as_ref().map(|c| c.resolve()).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_provider_id_roundtrip() {
        for p in ProviderId::ALL {
            assert_eq!(ProviderId::from_str(p.as_str()).unwrap(), p);
        }
    }

    #[test]
    fn test_provider_id_display() {
        assert_eq!(ProviderId::OpenAi.to_string(), "openai");
        assert_eq!(ProviderId::DeepSeek.to_string(), "deepseek");
    }

    #[test]
    fn test_provider_id_unknown() {
        assert!(ProviderId::from_str("bogus").is_err());
    }

    #[test]
    fn test_credential_direct() {
        let cred = Credential::Direct("sk-abc".into());
        assert_eq!(cred.resolve().unwrap(), "sk-abc");
    }

    #[test]
    fn test_credential_env_ref() {
        std::env::set_var("MAC_TEST_CRED", "secret-value");
        let cred = Credential::EnvRef {
            env: "MAC_TEST_CRED".into(),
        };
        assert_eq!(cred.resolve().unwrap(), "secret-value");
        std::env::remove_var("MAC_TEST_CRED");
    }

    #[test]
    fn test_credential_env_ref_missing() {
        let cred = Credential::EnvRef {
            env: "MAC_TEST_CRED_MISSING_XYZ".into(),
        };
        assert!(cred.resolve().is_err());
    }

    #[test]
    fn test_provider_config_builder() {
        let cfg = ProviderConfig::new(ProviderId::Oci, "cohere.command")
            .with_compartment_id("ocid1.compartment.oc1..abc");
        assert_eq!(cfg.compartment_id.as_deref(), Some("ocid1.compartment.oc1..abc"));
    }
}
