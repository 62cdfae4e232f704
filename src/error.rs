use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial link error: {0}")]
    Link(#[from] LinkError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl RemoteError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Failures on the serial link. None of these are fatal; the session
/// manager drops to `Disconnected` and retries on its reconnect interval.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("No serial ports found")]
    NoPortsFound,

    #[error("Failed to enumerate serial ports: {details}")]
    Enumerate { details: String },

    #[error("Failed to open serial port {port}: {details}")]
    Open { port: String, details: String },

    #[error("Serial write failed: {details}")]
    Write { details: String },

    #[error("Serial read failed: {details}")]
    Read { details: String },

    #[error("Failed to decode device response: {details}")]
    Decode { details: String },

    #[error("Serial link not connected")]
    NotConnected,
}

impl LinkError {
    pub fn is_recoverable(&self) -> bool {
        true
    }

    pub fn user_message(&self) -> String {
        match self {
            LinkError::NoPortsFound => "No device found, running in simulated mode".to_string(),
            LinkError::Open { port, .. } => format!("Could not open device on {}", port),
            LinkError::NotConnected => "Device not connected".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, RemoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_error_display() {
        let err = RemoteError::component("serial", "port vanished");
        assert_eq!(
            err.to_string(),
            "Component error in serial: port vanished"
        );
    }

    #[test]
    fn test_link_errors_are_recoverable() {
        let errors = [
            LinkError::NoPortsFound,
            LinkError::Open {
                port: "/dev/ttyUSB0".to_string(),
                details: "busy".to_string(),
            },
            LinkError::Write {
                details: "broken pipe".to_string(),
            },
            LinkError::NotConnected,
        ];
        assert!(errors.iter().all(LinkError::is_recoverable));
    }

    #[test]
    fn test_link_error_converts_into_remote_error() {
        let err: RemoteError = LinkError::NotConnected.into();
        assert!(matches!(err, RemoteError::Link(LinkError::NotConnected)));
        assert_eq!(err.to_string(), "Serial link error: Serial link not connected");
    }
}
