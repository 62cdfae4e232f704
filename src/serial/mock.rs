use super::backend::{PortInfo, SerialBackend, SerialConnection};
use crate::error::LinkError;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct MockState {
    ports: Vec<PortInfo>,
    unopenable: HashSet<String>,
    enumerate_fails: bool,
    open_attempts: Vec<String>,
    written: Vec<u8>,
    inbound: VecDeque<u8>,
    fail_writes: bool,
    fail_reads: bool,
    open_connections: usize,
}

/// Scripted in-memory backend for running without hardware.
///
/// Clones share state, so a test can keep a handle while the session
/// manager owns another.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_port(self, name: &str, description: Option<&str>) -> Self {
        self.state.lock().ports.push(PortInfo::new(name, description));
        self
    }

    /// Make opening `port` fail until re-enabled
    pub fn set_openable(&self, port: &str, openable: bool) {
        let mut state = self.state.lock();
        if openable {
            state.unopenable.remove(port);
        } else {
            state.unopenable.insert(port.to_string());
        }
    }

    pub fn set_enumerate_fails(&self, fails: bool) {
        self.state.lock().enumerate_fails = fails;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    /// Queue bytes as if the device had sent them
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.state.lock().inbound.extend(bytes.iter().copied());
    }

    pub fn open_attempts(&self) -> Vec<String> {
        self.state.lock().open_attempts.clone()
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.state.lock().written).into_owned()
    }

    /// Connections opened and not yet dropped
    pub fn open_connections(&self) -> usize {
        self.state.lock().open_connections
    }
}

impl SerialBackend for MockBackend {
    fn list_ports(&self) -> Result<Vec<PortInfo>, LinkError> {
        let state = self.state.lock();
        if state.enumerate_fails {
            return Err(LinkError::Enumerate {
                details: "mock enumeration failure".to_string(),
            });
        }
        Ok(state.ports.clone())
    }

    fn open(
        &self,
        port: &str,
        _baud_rate: u32,
        _timeout: Duration,
    ) -> Result<Box<dyn SerialConnection>, LinkError> {
        let mut state = self.state.lock();
        state.open_attempts.push(port.to_string());

        let known = state.ports.iter().any(|p| p.name == port);
        if !known || state.unopenable.contains(port) {
            return Err(LinkError::Open {
                port: port.to_string(),
                details: "No such device".to_string(),
            });
        }

        state.open_connections += 1;
        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl SerialConnection for MockConnection {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        state.written.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        let state = self.state.lock();
        if state.fail_reads {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        Ok(state.inbound.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.open_connections = state.open_connections.saturating_sub(1);
    }
}
