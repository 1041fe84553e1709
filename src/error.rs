use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Capture device whose access an external collaborator refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Camera,
    Microphone,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Camera => f.write_str("camera"),
            Device::Microphone => f.write_str("microphone"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Bad construction parameters. Only ever raised at setup.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0} permission denied")]
    PermissionDenied(Device),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_names_the_device() {
        let err = Error::PermissionDenied(Device::Microphone);
        assert_eq!(err.to_string(), "microphone permission denied");
    }

    #[test]
    fn invalid_config_carries_reason() {
        let err = Error::invalid("zone width must be > 0");
        assert!(matches!(err, Error::InvalidConfig(ref msg) if msg.contains("zone width")));
    }
}
