use crate::error::LinkError;
use serialport::SerialPortType;
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::debug;

/// A serial port as reported by enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub description: Option<String>,
}

impl PortInfo {
    pub fn new<S: Into<String>>(name: S, description: Option<&str>) -> Self {
        Self {
            name: name.into(),
            description: description.map(String::from),
        }
    }

    /// Case-insensitive match against the port name or its description
    pub fn matches_any(&self, patterns: &[String]) -> bool {
        let name = self.name.to_uppercase();
        let description = self
            .description
            .as_deref()
            .map(str::to_uppercase)
            .unwrap_or_default();

        patterns.iter().any(|pattern| {
            let pattern = pattern.to_uppercase();
            !pattern.is_empty() && (name.contains(&pattern) || description.contains(&pattern))
        })
    }
}

/// An open link to the device
pub trait SerialConnection: Send {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    /// Bytes waiting in the input buffer; never blocks
    fn bytes_available(&mut self) -> io::Result<usize>;
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Port enumeration and opening
pub trait SerialBackend: Send {
    fn list_ports(&self) -> Result<Vec<PortInfo>, LinkError>;
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn SerialConnection>, LinkError>;
}

/// Backend over the operating system's serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSerialBackend;

impl SerialBackend for SystemSerialBackend {
    fn list_ports(&self) -> Result<Vec<PortInfo>, LinkError> {
        let ports = serialport::available_ports().map_err(|e| LinkError::Enumerate {
            details: e.to_string(),
        })?;

        Ok(ports
            .into_iter()
            .map(|port| PortInfo {
                description: describe(&port.port_type),
                name: port.port_name,
            })
            .collect())
    }

    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn SerialConnection>, LinkError> {
        debug!("Opening {} at {} baud", port, baud_rate);
        let handle = serialport::new(port, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| LinkError::Open {
                port: port.to_string(),
                details: e.to_string(),
            })?;

        Ok(Box::new(SystemConnection { port: handle }))
    }
}

fn describe(port_type: &SerialPortType) -> Option<String> {
    match port_type {
        SerialPortType::UsbPort(info) => {
            let mut parts = vec!["USB".to_string()];
            parts.extend(info.manufacturer.clone());
            parts.extend(info.product.clone());
            Some(parts.join(" "))
        }
        SerialPortType::PciPort => Some("PCI".to_string()),
        SerialPortType::BluetoothPort => Some("Bluetooth".to_string()),
        SerialPortType::Unknown => None,
    }
}

/// The port handle is closed when this is dropped
struct SystemConnection {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialConnection for SystemConnection {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.port, bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(&mut self.port)
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(io::Error::from)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut self.port, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_pattern_matching() {
        let patterns = vec!["USB".to_string(), "ACM".to_string()];

        assert!(PortInfo::new("/dev/ttyUSB0", None).matches_any(&patterns));
        assert!(PortInfo::new("/dev/ttyACM1", None).matches_any(&patterns));
        assert!(PortInfo::new("COM3", Some("USB Silicon Labs CP2102")).matches_any(&patterns));
        assert!(!PortInfo::new("/dev/ttyS0", None).matches_any(&patterns));
        assert!(!PortInfo::new("/dev/ttyS0", Some("PCI")).matches_any(&patterns));
        assert!(!PortInfo::new("/dev/ttyUSB0", None).matches_any(&[String::new()]));
    }
}
