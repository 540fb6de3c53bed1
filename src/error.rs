//! Error types and handling for surplusd
//!
//! Startup failures (configuration, broker connect) are fatal and surface
//! through these types. Malformed telemetry never becomes an error; see
//! [`crate::telemetry`].

use thiserror::Error;

/// Result type alias for surplusd operations
pub type Result<T> = std::result::Result<T, SurplusError>;

/// Main error type for surplusd
#[derive(Debug, Error)]
pub enum SurplusError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// MQTT transport errors
    #[error("MQTT error: {message}")]
    Mqtt { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },
}

impl SurplusError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        SurplusError::Config {
            message: message.into(),
        }
    }

    /// Create a new MQTT error
    pub fn mqtt<S: Into<String>>(message: S) -> Self {
        SurplusError::Mqtt {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        SurplusError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        SurplusError::Io {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        SurplusError::Timeout {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for SurplusError {
    fn from(err: std::io::Error) -> Self {
        SurplusError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for SurplusError {
    fn from(err: serde_yaml::Error) -> Self {
        SurplusError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SurplusError {
    fn from(err: serde_json::Error) -> Self {
        SurplusError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<rumqttc::ClientError> for SurplusError {
    fn from(err: rumqttc::ClientError) -> Self {
        SurplusError::mqtt(err.to_string())
    }
}

impl From<rumqttc::ConnectionError> for SurplusError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        SurplusError::mqtt(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SurplusError::config("test config error");
        assert!(matches!(err, SurplusError::Config { .. }));

        let err = SurplusError::mqtt("test mqtt error");
        assert!(matches!(err, SurplusError::Mqtt { .. }));

        let err = SurplusError::validation("field", "test validation error");
        assert!(matches!(err, SurplusError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = SurplusError::config("test error");
        assert_eq!(format!("{}", err), "Configuration error: test error");

        let err = SurplusError::validation("charger.serial", "cannot be empty");
        assert_eq!(
            format!("{}", err),
            "Validation error: charger.serial - cannot be empty"
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SurplusError = io.into();
        assert!(matches!(err, SurplusError::Io { .. }));
    }
}
