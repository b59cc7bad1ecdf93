use crate::error::{to_env_var, ConfigError};
use chatrelay::providers::configs::{OpenAiProviderConfig, OPENAI_HOST, OPENAI_MODEL};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;

/// Read when `CHATRELAY_PROVIDER__API_KEY` is not set
pub const FALLBACK_API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(format!("{}:{}", self.host, self.port)))
    }
}

/// The upstream chat-completion service
#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_openai_host")]
    pub host: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            host: default_openai_host(),
            api_key: None,
            model: default_model(),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl ProviderSettings {
    /// Convert to the provider config, resolving the credential
    pub fn into_config(self) -> Result<OpenAiProviderConfig, ConfigError> {
        let api_key = self
            .api_key
            .filter(|key| !key.is_empty())
            .or_else(|| {
                std::env::var(FALLBACK_API_KEY_VAR)
                    .ok()
                    .filter(|key| !key.is_empty())
            })
            .ok_or_else(|| ConfigError::MissingEnvVar {
                env_var: to_env_var("provider.api_key"),
            })?;

        Ok(OpenAiProviderConfig {
            host: self.host,
            api_key,
            model: self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub provider: ProviderSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        // Start with default configuration
        let config = Config::builder()
            // Server defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            // Provider defaults
            .set_default("provider.host", default_openai_host())?
            .set_default("provider.model", default_model())?
            // Optional chatrelay.toml in the working directory
            .add_source(File::with_name("chatrelay").required(false))
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("CHATRELAY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        // Every field has a default, so only malformed values fail here
        Ok(config.try_deserialize()?)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_model() -> String {
    OPENAI_MODEL.to_string()
}

fn default_openai_host() -> String {
    OPENAI_HOST.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("CHATRELAY_") {
                env::remove_var(&key);
            }
        }
        env::remove_var(FALLBACK_API_KEY_VAR);
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();
        env::set_var("CHATRELAY_PROVIDER__API_KEY", "test-key");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 3000);

        let config = settings.provider.into_config().unwrap();
        assert_eq!(config.host, "https://api.openai.com");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.model, "gpt-4-turbo");
        assert_eq!(config.temperature, None);
        assert_eq!(config.max_tokens, None);

        clean_env();
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("CHATRELAY_SERVER__PORT", "8080");
        env::set_var("CHATRELAY_PROVIDER__API_KEY", "test-key");
        env::set_var("CHATRELAY_PROVIDER__HOST", "https://custom.openai.com");
        env::set_var("CHATRELAY_PROVIDER__MODEL", "gpt-3.5-turbo");
        env::set_var("CHATRELAY_PROVIDER__TEMPERATURE", "0.8");
        env::set_var("CHATRELAY_PROVIDER__MAX_TOKENS", "2000");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 8080);

        let config = settings.provider.into_config().unwrap();
        assert_eq!(config.host, "https://custom.openai.com");
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.temperature, Some(0.8));
        assert_eq!(config.max_tokens, Some(2000));

        clean_env();
    }

    #[test]
    #[serial]
    fn test_fallback_api_key() {
        clean_env();
        env::set_var(FALLBACK_API_KEY_VAR, "sk-from-openai-var");

        let config = Settings::new().unwrap().provider.into_config().unwrap();
        assert_eq!(config.api_key, "sk-from-openai-var");

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_api_key() {
        clean_env();

        let err = Settings::new().unwrap().provider.into_config().unwrap_err();
        match err {
            ConfigError::MissingEnvVar { env_var } => {
                assert_eq!(env_var, "CHATRELAY_PROVIDER__API_KEY")
            }
            other => panic!("Expected missing env var, got {}", other),
        }
    }

    #[test]
    #[serial]
    fn test_malformed_value_is_reported() {
        clean_env();
        env::set_var("CHATRELAY_SERVER__PORT", "not-a-port");

        let err = Settings::new().unwrap_err();
        assert!(matches!(err, ConfigError::Other(_)), "got {}", err);

        clean_env();
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let addr = server_settings.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");

        let bad = ServerSettings {
            host: "not a host".to_string(),
            port: 3000,
        };
        assert!(matches!(bad.socket_addr(), Err(ConfigError::InvalidAddress(_))));
    }
}
