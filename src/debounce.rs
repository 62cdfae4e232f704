//! Turns the jittery per-frame classification stream into discrete,
//! rate-limited gesture events.
//!
//! A gesture fires only when it holds a majority of a full window and the
//! cooldown since the previous firing has elapsed. Firing clears the window
//! so leftover frames of the same pose cannot immediately fire again.

use crate::classifier::GestureSymbol;
use crate::config::DebounceConfig;
use crate::ring_buffer::RingBuffer;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// A gesture that survived debouncing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StableGestureEvent {
    pub symbol: GestureSymbol,
    pub at: Instant,
}

/// Sliding window of the most recent per-frame symbols
pub type DebounceWindow = RingBuffer<GestureSymbol>;

pub struct Debouncer {
    window: DebounceWindow,
    majority: usize,
    cooldown: Duration,
    last_emission: Option<Instant>,
}

impl Debouncer {
    pub fn new(config: &DebounceConfig) -> Self {
        Self {
            window: RingBuffer::new(config.window_size),
            majority: config.majority,
            cooldown: config.cooldown(),
            last_emission: None,
        }
    }

    /// Feed one frame's symbol; returns an event when the window agrees and
    /// the cooldown has passed.
    pub fn observe(&mut self, symbol: GestureSymbol, now: Instant) -> Option<StableGestureEvent> {
        self.window.push(symbol);
        if !self.window.is_full() {
            return None;
        }

        let (winner, count) = self.majority_vote()?;
        if count < self.majority || winner.is_none() {
            return None;
        }

        if let Some(last) = self.last_emission {
            let elapsed = now.saturating_duration_since(last);
            if elapsed <= self.cooldown {
                trace!(
                    "{} held {}/{} but cooldown has {:?} left",
                    winner,
                    count,
                    self.window.capacity(),
                    self.cooldown - elapsed
                );
                return None;
            }
        }

        self.last_emission = Some(now);
        self.window.clear();
        debug!(
            "Stable gesture {} ({}/{} frames)",
            winner,
            count,
            self.window.capacity()
        );

        Some(StableGestureEvent { symbol: winner, at: now })
    }

    /// Most frequent symbol in the window and its count. Ties go to the
    /// symbol seen most recently.
    pub fn majority_vote(&self) -> Option<(GestureSymbol, usize)> {
        let mut counts: HashMap<GestureSymbol, usize> = HashMap::new();
        for symbol in self.window.iter() {
            *counts.entry(*symbol).or_default() += 1;
        }

        let mut best: Option<(GestureSymbol, usize)> = None;
        for symbol in self.window.iter().rev() {
            let count = counts.get(symbol).copied().unwrap_or(0);
            match best {
                Some((_, best_count)) if best_count >= count => {}
                _ => best = Some((*symbol, count)),
            }
        }
        best
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.last_emission = None;
    }

    pub fn window(&self) -> &DebounceWindow {
        &self.window
    }

    pub fn last_emission(&self) -> Option<Instant> {
        self.last_emission
    }
}
