use profiles::{ProfileError, SettingsError};
use renderer::ShaderError;
use selector::SelectorError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to parse engine config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid engine config: {0}")]
    Config(String),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error("engine has been shut down")]
    ShutDown,
}
