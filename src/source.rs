use crate::error::Result;
use crate::landmark::{HandFrame, HandLandmarks, Landmark, LANDMARK_COUNT};
use serde::Deserialize;
use std::io::BufRead;
use tracing::{debug, warn};

/// Supplier of per-frame hand landmarks from an external detector
pub trait LandmarkSource: Send {
    /// Next frame, or `Ok(None)` once the stream has ended
    fn next_frame(&mut self) -> Result<Option<HandFrame>>;
}

/// One detector record: `{"hands": [[[x, y, z], ...21 points], ...]}`
#[derive(Debug, Deserialize)]
struct FrameRecord {
    #[serde(default)]
    hands: Vec<Vec<[f32; 3]>>,
}

/// Reads newline-delimited JSON detector output.
///
/// Only the first hand of each record is used. Malformed lines and hands
/// without exactly 21 points are logged and yield an empty frame.
pub struct JsonLinesSource<R> {
    reader: R,
    line: String,
    line_number: u64,
    malformed: u64,
}

impl<R: BufRead + Send> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            line_number: 0,
            malformed: 0,
        }
    }

    /// Lines that could not be turned into a hand
    pub fn malformed_lines(&self) -> u64 {
        self.malformed
    }

    fn parse_line(&mut self) -> HandFrame {
        let record: FrameRecord = match serde_json::from_str(self.line.trim()) {
            Ok(record) => record,
            Err(e) => {
                self.malformed += 1;
                warn!("Skipping malformed landmark line {}: {}", self.line_number, e);
                return HandFrame::empty();
            }
        };

        let Some(points) = record.hands.first() else {
            return HandFrame::empty();
        };

        let landmarks: Vec<Landmark> = points.iter().copied().map(Landmark::from).collect();
        match HandLandmarks::from_slice(&landmarks) {
            Some(hand) => HandFrame::with_hand(hand),
            None => {
                self.malformed += 1;
                warn!(
                    "Skipping hand with {} landmarks on line {} (expected {})",
                    landmarks.len(),
                    self.line_number,
                    LANDMARK_COUNT
                );
                HandFrame::empty()
            }
        }
    }
}

impl<R: BufRead + Send> LandmarkSource for JsonLinesSource<R> {
    fn next_frame(&mut self) -> Result<Option<HandFrame>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                debug!("Landmark stream ended after {} lines", self.line_number);
                return Ok(None);
            }
            self.line_number += 1;

            if self.line.trim().is_empty() {
                continue;
            }
            return Ok(Some(self.parse_line()));
        }
    }
}
