pub mod config;
pub mod domain;
pub mod errors;
pub mod secrets;

pub use config::{AppConfig, ConfigError, ConfigOverrides, Environment, HostMode, LoadOptions};
pub use domain::{AgentConnector, AgentMessage, AgentRequest, AgentResult, MessageRole};
pub use errors::AgentError;
pub use secrets::{EnvSecretStore, Secret, SecretProvider, SecretStore, SecretStoreError};
