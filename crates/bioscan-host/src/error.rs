use bioscan_bridge::BridgeError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::ui::UiError;

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ui(#[from] UiError),

    #[error("bridge session failed: {0}")]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, HostError>;
