use super::backend::{SerialBackend, SerialConnection};
use super::reconnect::ReconnectPolicy;
use crate::config::SerialConfig;
use crate::error::LinkError;
use crate::events::{EventBus, RemoteEvent};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Inbound bytes without a newline are surfaced as a line past this size
const MAX_LINE_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Owns the device link: discovery, connect, I/O and reconnects.
///
/// I/O failures never propagate as fatal errors; they drop the link to
/// `Disconnected` and `maintain` brings it back on the reconnect interval.
pub struct SerialSessionManager {
    backend: Box<dyn SerialBackend>,
    config: SerialConfig,
    event_bus: EventBus,
    state: LinkState,
    connection: Option<Box<dyn SerialConnection>>,
    active_port: Option<String>,
    last_attempt: Option<Instant>,
    policy: ReconnectPolicy,
    read_buffer: Vec<u8>,
}

impl SerialSessionManager {
    pub fn new(backend: Box<dyn SerialBackend>, config: SerialConfig, event_bus: EventBus) -> Self {
        let policy = ReconnectPolicy::from_config(&config);
        Self {
            backend,
            config,
            event_bus,
            state: LinkState::Disconnected,
            connection: None,
            active_port: None,
            last_attempt: None,
            policy,
            read_buffer: Vec::new(),
        }
    }

    /// Ports to try, in order: USB/ACM-looking ports when any exist,
    /// otherwise every port; the manual port is appended as a fallback.
    pub fn discover_candidates(&self) -> Vec<String> {
        let ports = match self.backend.list_ports() {
            Ok(ports) => ports,
            Err(e) => {
                warn!("Port discovery failed: {}", e);
                Vec::new()
            }
        };

        let preferred: Vec<String> = ports
            .iter()
            .filter(|port| port.matches_any(&self.config.port_patterns))
            .map(|port| port.name.clone())
            .collect();

        let mut candidates = if preferred.is_empty() {
            ports.into_iter().map(|port| port.name).collect()
        } else {
            preferred
        };

        if let Some(manual) = &self.config.port {
            if !candidates.contains(manual) {
                candidates.push(manual.clone());
            }
        }

        debug!("Serial port candidates: {:?}", candidates);
        candidates
    }

    /// Try each candidate in order; the first port that opens becomes the link
    pub fn try_connect(&mut self, now: Instant) -> Result<String, LinkError> {
        if let (LinkState::Connected, Some(port)) = (self.state, &self.active_port) {
            return Ok(port.clone());
        }

        self.last_attempt = Some(now);
        self.set_state(LinkState::Connecting);

        let mut last_error = LinkError::NoPortsFound;
        for port in self.discover_candidates() {
            match self
                .backend
                .open(&port, self.config.baud_rate, self.config.read_timeout())
            {
                Ok(connection) => {
                    let settle = self.config.settle_delay();
                    if !settle.is_zero() {
                        debug!("Waiting {:?} for device on {} to boot", settle, port);
                        std::thread::sleep(settle);
                    }

                    self.connection = Some(connection);
                    self.active_port = Some(port.clone());
                    self.read_buffer.clear();
                    self.policy.record_success();
                    self.set_state(LinkState::Connected);
                    info!("Serial link established on {}", port);
                    return Ok(port);
                }
                Err(e) => {
                    debug!("Could not open {}: {}", port, e);
                    last_error = e;
                }
            }
        }

        self.policy.record_failure();
        self.set_state(LinkState::Disconnected);
        warn!(
            "No device connected ({}), retrying in {:?}",
            last_error.user_message(),
            self.policy.current_interval()
        );
        Err(last_error)
    }

    /// Write and flush; a failure drops the link and is not retried here
    pub fn write_line(&mut self, text: &str) -> Result<(), LinkError> {
        let connection = match (self.state, self.connection.as_mut()) {
            (LinkState::Connected, Some(connection)) => connection,
            _ => return Err(LinkError::NotConnected),
        };

        let result = connection
            .write_all(text.as_bytes())
            .and_then(|()| connection.flush());

        match result {
            Ok(()) => {
                debug!("Wrote {:?}", text);
                Ok(())
            }
            Err(e) => {
                let error = LinkError::Write {
                    details: e.to_string(),
                };
                self.fail(&error);
                Err(error)
            }
        }
    }

    /// Drain whatever the device has sent and surface complete lines
    pub fn poll_read(&mut self) -> Result<Vec<String>, LinkError> {
        let Some(connection) = self.connection.as_mut() else {
            return Ok(Vec::new());
        };

        let read = connection.bytes_available().and_then(|available| {
            if available == 0 {
                return Ok(Vec::new());
            }
            let mut buf = vec![0u8; available];
            let n = connection.read(&mut buf)?;
            buf.truncate(n);
            Ok(buf)
        });

        let bytes = match read {
            Ok(bytes) => bytes,
            Err(e) => {
                let error = LinkError::Read {
                    details: e.to_string(),
                };
                self.fail(&error);
                return Err(error);
            }
        };
        self.read_buffer.extend_from_slice(&bytes);

        let mut lines = Vec::new();
        while let Some(raw) = self.next_raw_line() {
            let text = match String::from_utf8(raw) {
                Ok(text) => text,
                Err(e) => {
                    let error = LinkError::Decode {
                        details: e.to_string(),
                    };
                    self.fail(&error);
                    return Err(error);
                }
            };

            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            debug!("Device: {}", text);
            self.event_bus.notify(RemoteEvent::DeviceMessage {
                text: text.to_string(),
                timestamp: Utc::now(),
            });
            lines.push(text.to_string());
        }

        Ok(lines)
    }

    fn next_raw_line(&mut self) -> Option<Vec<u8>> {
        if let Some(pos) = self.read_buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.read_buffer.drain(..=pos).collect();
            line.pop();
            return Some(line);
        }
        if self.read_buffer.len() >= MAX_LINE_BYTES {
            return Some(std::mem::take(&mut self.read_buffer));
        }
        None
    }

    /// Reconnect when disconnected and the reconnect interval has passed.
    /// Returns whether an attempt was made.
    pub fn maintain(&mut self, now: Instant) -> bool {
        if self.state != LinkState::Disconnected || !self.policy.is_due(self.last_attempt, now) {
            return false;
        }

        if let Err(e) = self.try_connect(now) {
            debug!("Reconnect attempt failed: {}", e);
        }
        true
    }

    /// Close the port, if open
    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            info!(
                "Closing serial link on {}",
                self.active_port.as_deref().unwrap_or("?")
            );
        }
        self.read_buffer.clear();
        self.set_state(LinkState::Disconnected);
    }

    /// Drop the link after a transient failure. The bus logs the error.
    fn fail(&mut self, error: &LinkError) {
        self.event_bus.notify(RemoteEvent::SystemError {
            component: "serial".to_string(),
            error: format!(
                "link on {} lost: {}",
                self.active_port.as_deref().unwrap_or("?"),
                error
            ),
        });
        self.connection = None;
        self.read_buffer.clear();
        self.set_state(LinkState::Disconnected);
    }

    fn set_state(&mut self, state: LinkState) {
        if self.state == state {
            return;
        }
        let previous = std::mem::replace(&mut self.state, state);
        debug!("Link state {:?} -> {:?}", previous, state);

        let port = if state == LinkState::Connected || previous == LinkState::Connected {
            self.active_port.clone()
        } else {
            None
        };
        self.event_bus.notify(RemoteEvent::link_status(state, port));
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    pub fn active_port(&self) -> Option<&str> {
        self.active_port.as_deref()
    }

    pub fn last_attempt(&self) -> Option<Instant> {
        self.last_attempt
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }
}

impl Drop for SerialSessionManager {
    fn drop(&mut self) {
        if self.connection.take().is_some() {
            debug!("Serial session dropped, port released");
        }
    }
}
