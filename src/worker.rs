use crate::classifier::{GestureClassifier, GestureSymbol};
use crate::commands::{legacy_line, model_select_line, CommandMapper, CommandTable};
use crate::config::{CommandMode, RemoteConfig};
use crate::debounce::{Debouncer, StableGestureEvent};
use crate::error::{LinkError, Result};
use crate::events::{EventBus, RemoteEvent};
use crate::irdb::CommandSet;
use crate::landmark::HandFrame;
use crate::serial::{SerialBackend, SerialSessionManager};
use crate::source::LandmarkSource;
use chrono::Utc;
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Counters kept by the worker loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub frames_processed: u64,
    pub gestures_emitted: u64,
    pub commands_sent: u64,
    pub mapping_misses: u64,
    pub device_messages: u64,
}

/// The single owner of the debounce window and the serial link.
///
/// Everything runs on the caller's thread; observers only see what is
/// published on the event bus.
pub struct GestureWorker {
    classifier: GestureClassifier,
    debouncer: Debouncer,
    mapper: CommandMapper,
    session: SerialSessionManager,
    event_bus: EventBus,
    mode: CommandMode,
    model: Option<String>,
    idle_poll: Duration,
    stats: WorkerStats,
}

impl GestureWorker {
    pub fn new(
        config: &RemoteConfig,
        backend: Box<dyn SerialBackend>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            classifier: GestureClassifier::new(config.classifier.clone()),
            debouncer: Debouncer::new(&config.debounce),
            mapper: CommandMapper::new(CommandTable::new()),
            session: SerialSessionManager::new(backend, config.serial.clone(), event_bus.clone()),
            event_bus,
            mode: config.commands.mode,
            model: None,
            idle_poll: Duration::from_millis(config.system.idle_poll_ms),
            stats: WorkerStats::default(),
        }
    }

    /// Classify one frame and act on any gesture that survives debouncing
    pub fn process_frame(&mut self, frame: &HandFrame, now: Instant) -> Option<StableGestureEvent> {
        let symbol = self.classifier.classify_frame(frame);
        self.stats.frames_processed += 1;
        trace!("Frame {} -> {}", self.stats.frames_processed, symbol);
        self.event_bus.notify(RemoteEvent::FrameProcessed {
            symbol,
            timestamp: Utc::now(),
        });

        let event = self.debouncer.observe(symbol, now)?;
        self.stats.gestures_emitted += 1;
        info!("Gesture detected: {}", event.symbol);
        self.event_bus.notify(RemoteEvent::GestureDetected {
            symbol: event.symbol,
            timestamp: Utc::now(),
        });

        self.dispatch(&event);
        Some(event)
    }

    fn dispatch(&mut self, event: &StableGestureEvent) {
        let line = match self.mode {
            CommandMode::Legacy => legacy_line(event.symbol),
            CommandMode::Ir => self.mapper.map(event).map(|command| command.to_line()),
        };

        match line {
            Some(line) => self.send(event.symbol, &line),
            None => {
                self.stats.mapping_misses += 1;
                warn!("No command for gesture {}", event.symbol);
                self.event_bus.notify(RemoteEvent::NoCommandForGesture {
                    symbol: event.symbol,
                    timestamp: Utc::now(),
                });
            }
        }
    }

    fn send(&mut self, symbol: GestureSymbol, line: &str) {
        match self.session.write_line(line) {
            Ok(()) => {
                self.stats.commands_sent += 1;
                info!("Sent {} for {}", line.trim_end(), symbol);
                self.event_bus.notify(RemoteEvent::CommandSent {
                    symbol,
                    line: line.to_string(),
                    timestamp: Utc::now(),
                });
            }
            Err(LinkError::NotConnected) => {
                info!("Simulated send (no device): {}", line.trim_end());
            }
            Err(e) => debug!("Command {} dropped: {}", line.trim_end(), e),
        }
    }

    /// Replace the active command table and tell the device which model to use
    pub fn load_command_set(&mut self, set: CommandSet) {
        let commands = set.table.len();
        info!("Loaded {} IR commands for {}", commands, set.model);
        self.mapper.set_command_table(set.table);
        self.model = Some(set.model.clone());
        self.select_model();
        self.event_bus.notify(RemoteEvent::CommandSetLoaded {
            model: set.model,
            commands,
            timestamp: Utc::now(),
        });
    }

    fn select_model(&mut self) {
        if self.mode != CommandMode::Ir || !self.session.is_connected() {
            return;
        }
        let Some(model) = &self.model else {
            return;
        };

        let line = model_select_line(model);
        if let Err(e) = self.session.write_line(&line) {
            debug!("Model select for {} not sent: {}", model, e);
        }
    }

    /// Reconnect when due, then drain device output. A fresh connection
    /// gets the model-select line again since the device resets on open.
    pub fn maintain_link(&mut self, now: Instant) {
        if self.session.maintain(now) && self.session.is_connected() {
            self.select_model();
        }

        match self.session.poll_read() {
            Ok(lines) => self.stats.device_messages += lines.len() as u64,
            Err(e) => debug!("Device read failed: {}", e),
        }
    }

    /// Run until the token is cancelled or the landmark stream ends
    pub fn run(
        &mut self,
        source: &mut dyn LandmarkSource,
        cancel: &CancellationToken,
    ) -> Result<WorkerStats> {
        info!("Gesture worker started ({:?} mode)", self.mode);

        loop {
            if cancel.is_cancelled() {
                info!("Gesture worker cancelled");
                break;
            }

            self.maintain_link(Instant::now());

            match source.next_frame() {
                Ok(Some(frame)) => {
                    self.process_frame(&frame, Instant::now());
                }
                Ok(None) => {
                    self.event_bus.notify(RemoteEvent::ShutdownRequested {
                        reason: "end of landmark input".to_string(),
                        timestamp: Utc::now(),
                    });
                    break;
                }
                Err(e) => {
                    self.event_bus.notify(RemoteEvent::SystemError {
                        component: "source".to_string(),
                        error: e.to_string(),
                    });
                    // An unreadable frame still counts as an empty one
                    self.process_frame(&HandFrame::empty(), Instant::now());
                    std::thread::sleep(self.idle_poll);
                }
            }
        }

        self.session.disconnect();
        info!("Gesture worker stopped: {:?}", self.stats);
        Ok(self.stats)
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    pub fn session(&self) -> &SerialSessionManager {
        &self.session
    }

    pub fn mode(&self) -> CommandMode {
        self.mode
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn command_table(&self) -> &CommandTable {
        self.mapper.command_table()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::tests::{open_palm, pose, THUMB_TUCKED};
    use crate::commands::IrCommandRecord;
    use crate::landmark::HandLandmarks;
    use crate::serial::{LinkState, MockBackend};
    use crate::source::JsonLinesSource;
    use std::io::Cursor;

    const FRAME_INTERVAL: Duration = Duration::from_millis(33);

    fn create_test_config(mode: CommandMode) -> RemoteConfig {
        let mut config = RemoteConfig::default();
        config.serial.settle_delay_ms = 0;
        config.system.idle_poll_ms = 0;
        config.commands.mode = mode;
        config
    }

    fn create_worker(mode: CommandMode) -> (GestureWorker, MockBackend, EventBus) {
        let backend = MockBackend::new().with_port("/dev/ttyUSB0", Some("USB CP2102"));
        let event_bus = EventBus::new(256);
        let worker = GestureWorker::new(
            &create_test_config(mode),
            Box::new(backend.clone()),
            event_bus.clone(),
        );
        (worker, backend, event_bus)
    }

    fn samsung_set() -> CommandSet {
        CommandSet {
            model: "Samsung".to_string(),
            table: CommandTable::from_records(vec![IrCommandRecord {
                name: "Power".to_string(),
                protocol: Some("NEC".to_string()),
                address: Some("00 00 00 00".to_string()),
                command: Some("34 12 00 00".to_string()),
            }]),
        }
    }

    fn feed(
        worker: &mut GestureWorker,
        hand: HandLandmarks,
        frames: usize,
        start: Instant,
    ) -> Vec<StableGestureEvent> {
        let frame = HandFrame::with_hand(hand);
        (0..frames)
            .filter_map(|i| worker.process_frame(&frame, start + FRAME_INTERVAL * i as u32))
            .collect()
    }

    fn drain(receiver: &mut tokio::sync::broadcast::Receiver<RemoteEvent>) -> Vec<RemoteEvent> {
        std::iter::from_fn(|| receiver.try_recv().ok()).collect()
    }

    #[test]
    fn test_open_palm_sends_power_command() {
        let (mut worker, backend, event_bus) = create_worker(CommandMode::Ir);
        let start = Instant::now();
        worker.maintain_link(start);
        assert_eq!(worker.session().state(), LinkState::Connected);

        worker.load_command_set(samsung_set());
        assert_eq!(backend.written_text(), "#Samsung\n");

        let mut receiver = event_bus.subscribe();
        let events = feed(&mut worker, open_palm(), 7, start);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].symbol, GestureSymbol::Power);
        assert_eq!(backend.written_text(), "#Samsung\n!NEC:00:1234\n");

        let stats = worker.stats();
        assert_eq!(stats.frames_processed, 7);
        assert_eq!(stats.gestures_emitted, 1);
        assert_eq!(stats.commands_sent, 1);

        let published = drain(&mut receiver);
        let frames = published
            .iter()
            .filter(|e| matches!(e, RemoteEvent::FrameProcessed { .. }))
            .count();
        assert_eq!(frames, 7);
        assert!(published.iter().any(|e| matches!(
            e,
            RemoteEvent::CommandSent { line, .. } if line == "!NEC:00:1234\n"
        )));
    }

    #[test]
    fn test_mapping_miss_is_reported() {
        let (mut worker, backend, event_bus) = create_worker(CommandMode::Ir);
        let start = Instant::now();
        worker.maintain_link(start);
        worker.load_command_set(samsung_set());
        let mut receiver = event_bus.subscribe();

        let fist = pose([false; 4], THUMB_TUCKED.0, THUMB_TUCKED.1);
        let events = feed(&mut worker, fist, 7, start);
        assert_eq!(events[0].symbol, GestureSymbol::Mute);
        assert_eq!(worker.stats().mapping_misses, 1);
        assert_eq!(worker.stats().commands_sent, 0);
        assert_eq!(backend.written_text(), "#Samsung\n");

        assert!(drain(&mut receiver).iter().any(|e| matches!(
            e,
            RemoteEvent::NoCommandForGesture {
                symbol: GestureSymbol::Mute,
                ..
            }
        )));
    }

    #[test]
    fn test_legacy_mode_sends_bare_letters() {
        let (mut worker, backend, _bus) = create_worker(CommandMode::Legacy);
        let start = Instant::now();
        worker.maintain_link(start);
        worker.load_command_set(samsung_set());

        feed(&mut worker, open_palm(), 7, start);
        let fist = pose([false; 4], THUMB_TUCKED.0, THUMB_TUCKED.1);
        feed(&mut worker, fist, 7, start + Duration::from_secs(2));

        assert_eq!(backend.written_text(), "PM");
        assert_eq!(worker.stats().commands_sent, 2);
    }

    #[test]
    fn test_runs_simulated_without_device() {
        let (mut worker, backend, _bus) = create_worker(CommandMode::Ir);
        backend.set_openable("/dev/ttyUSB0", false);
        let start = Instant::now();
        worker.maintain_link(start);
        worker.load_command_set(samsung_set());

        let events = feed(&mut worker, open_palm(), 7, start);
        assert_eq!(events.len(), 1);
        assert_eq!(worker.stats().commands_sent, 0);
        assert!(backend.written().is_empty());
        assert_eq!(worker.model(), Some("Samsung"));
    }

    #[test]
    fn test_reconnect_resends_model_select() {
        let (mut worker, backend, _bus) = create_worker(CommandMode::Ir);
        backend.set_openable("/dev/ttyUSB0", false);
        let start = Instant::now();
        worker.maintain_link(start);
        worker.load_command_set(samsung_set());
        assert!(backend.written().is_empty());

        backend.set_openable("/dev/ttyUSB0", true);
        worker.maintain_link(start + Duration::from_secs(3));
        assert!(!worker.session().is_connected());
        worker.maintain_link(start + Duration::from_secs(6));
        assert!(worker.session().is_connected());
        assert_eq!(backend.written_text(), "#Samsung\n");
    }

    #[test]
    fn test_device_messages_counted() {
        let (mut worker, backend, _bus) = create_worker(CommandMode::Ir);
        let start = Instant::now();
        worker.maintain_link(start);

        backend.push_inbound(b"OK\nSent NEC\n");
        worker.maintain_link(start + FRAME_INTERVAL);
        assert_eq!(worker.stats().device_messages, 2);
    }

    #[test]
    fn test_run_until_end_of_input() {
        let (mut worker, backend, event_bus) = create_worker(CommandMode::Ir);
        worker.load_command_set(samsung_set());
        let mut receiver = event_bus.subscribe();

        let hand: Vec<String> = open_palm()
            .points()
            .iter()
            .map(|p| format!("[{}, {}, {}]", p.x, p.y, p.z))
            .collect();
        let line = format!("{{\"hands\": [[{}]]}}\n", hand.join(", "));
        let mut source = JsonLinesSource::new(Cursor::new(line.repeat(7)));

        let stats = worker.run(&mut source, &CancellationToken::new()).unwrap();
        assert_eq!(stats.frames_processed, 7);
        assert_eq!(stats.gestures_emitted, 1);
        assert_eq!(stats.commands_sent, 1);
        assert!(backend.written_text().ends_with("!NEC:00:1234\n"));

        // Link is released when the loop exits
        assert_eq!(backend.open_connections(), 0);
        assert!(drain(&mut receiver)
            .iter()
            .any(|e| matches!(e, RemoteEvent::ShutdownRequested { .. })));
    }

    /// Replays frames, sleeping before each one as a slow detector would
    struct ScriptedSource {
        frames: std::collections::VecDeque<(Duration, Result<Option<HandFrame>>)>,
    }

    impl LandmarkSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<HandFrame>> {
            match self.frames.pop_front() {
                Some((delay, frame)) => {
                    std::thread::sleep(delay);
                    frame
                }
                None => Ok(None),
            }
        }
    }

    fn palm_frame() -> Result<Option<HandFrame>> {
        Ok(Some(HandFrame::with_hand(open_palm())))
    }

    fn unreadable_frame() -> Result<Option<HandFrame>> {
        Err(crate::error::RemoteError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "stream did not contain valid UTF-8",
        )))
    }

    #[test]
    fn test_unreadable_frames_count_as_empty() {
        let (mut worker, _backend, event_bus) = create_worker(CommandMode::Ir);
        let mut receiver = event_bus.subscribe();

        let mut frames: std::collections::VecDeque<_> =
            (0..5).map(|_| (Duration::ZERO, palm_frame())).collect();
        frames.push_back((Duration::ZERO, unreadable_frame()));
        frames.push_back((Duration::ZERO, unreadable_frame()));
        let mut source = ScriptedSource { frames };

        let stats = worker.run(&mut source, &CancellationToken::new()).unwrap();
        assert_eq!(stats.frames_processed, 7);
        assert_eq!(stats.gestures_emitted, 1);

        let source_errors = drain(&mut receiver)
            .into_iter()
            .filter(|e| match e {
                RemoteEvent::SystemError { component, .. } => component == "source",
                _ => false,
            })
            .count();
        assert_eq!(source_errors, 2);
    }

    #[test]
    fn test_frames_are_stamped_when_read() {
        let mut config = create_test_config(CommandMode::Ir);
        config.debounce.window_size = 1;
        config.debounce.majority = 1;
        config.debounce.cooldown_ms = 50;
        let backend = MockBackend::new();
        let mut worker = GestureWorker::new(&config, Box::new(backend), EventBus::new(64));

        // The second frame arrives after the cooldown even though the loop
        // started waiting for it well inside it
        let mut source = ScriptedSource {
            frames: [
                (Duration::ZERO, palm_frame()),
                (Duration::from_millis(80), palm_frame()),
            ]
            .into_iter()
            .collect(),
        };

        let stats = worker.run(&mut source, &CancellationToken::new()).unwrap();
        assert_eq!(stats.frames_processed, 2);
        assert_eq!(stats.gestures_emitted, 2);
    }

    #[test]
    fn test_run_stops_when_cancelled() {
        let (mut worker, backend, _bus) = create_worker(CommandMode::Ir);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut source = JsonLinesSource::new(Cursor::new("{\"hands\": []}\n".repeat(3)));
        let stats = worker.run(&mut source, &cancel).unwrap();
        assert_eq!(stats.frames_processed, 0);
        assert_eq!(backend.open_connections(), 0);
    }
}
