use crate::config::ClassifierConfig;
use crate::geometry::{distance, is_extended_with_margin};
use crate::landmark::{
    HandFrame, HandLandmarks, Landmark, INDEX_MCP, INDEX_PIP, INDEX_TIP, MIDDLE_PIP, MIDDLE_TIP,
    PINKY_PIP, PINKY_TIP, RING_PIP, RING_TIP, THUMB_IP, THUMB_TIP, WRIST,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// Discrete gesture vocabulary produced once per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GestureSymbol {
    None,
    Power,
    Mute,
    VolumeUp,
    VolumeDown,
    ChannelNext,
    ChannelPrev,
    Source,
}

impl GestureSymbol {
    pub const ALL: [GestureSymbol; 8] = [
        GestureSymbol::None,
        GestureSymbol::Power,
        GestureSymbol::Mute,
        GestureSymbol::VolumeUp,
        GestureSymbol::VolumeDown,
        GestureSymbol::ChannelNext,
        GestureSymbol::ChannelPrev,
        GestureSymbol::Source,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GestureSymbol::None => "NONE",
            GestureSymbol::Power => "POWER",
            GestureSymbol::Mute => "MUTE",
            GestureSymbol::VolumeUp => "VOLUME_UP",
            GestureSymbol::VolumeDown => "VOLUME_DOWN",
            GestureSymbol::ChannelNext => "CHANNEL_NEXT",
            GestureSymbol::ChannelPrev => "CHANNEL_PREV",
            GestureSymbol::Source => "SOURCE",
        }
    }

    /// Single-letter command understood by the simple firmware
    pub fn legacy_code(&self) -> Option<char> {
        match self {
            GestureSymbol::None => None,
            GestureSymbol::Power => Some('P'),
            GestureSymbol::Mute => Some('M'),
            GestureSymbol::VolumeUp => Some('U'),
            GestureSymbol::VolumeDown => Some('D'),
            GestureSymbol::ChannelNext => Some('N'),
            GestureSymbol::ChannelPrev => Some('L'),
            GestureSymbol::Source => Some('S'),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, GestureSymbol::None)
    }
}

impl fmt::Display for GestureSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geometric facts about one hand that the rules are evaluated against
#[derive(Debug, Clone, Copy)]
pub struct HandFeatures {
    /// Extension of index, middle, ring and pinky, in that order
    pub fingers: [bool; 4],
    pub finger_count: usize,
    pub thumb_extended: bool,
    pub thumb_tip: Landmark,
    pub thumb_ip: Landmark,
    pub index_mcp: Landmark,
    pub index_tip: Landmark,
    pub index_pip: Landmark,
    pub pointing_threshold: f32,
}

impl HandFeatures {
    pub fn index_extended(&self) -> bool {
        self.fingers[0]
    }

    pub fn total(&self) -> usize {
        self.finger_count + usize::from(self.thumb_extended)
    }

    fn thumb_points_up(&self) -> bool {
        self.thumb_tip.y < self.thumb_ip.y && self.thumb_tip.y < self.index_mcp.y
    }

    fn thumb_points_down(&self) -> bool {
        self.thumb_tip.y > self.thumb_ip.y && self.thumb_tip.y > self.index_mcp.y
    }
}

/// One entry of the ordered decision table
pub struct GestureRule {
    pub name: &'static str,
    pub apply: fn(&HandFeatures) -> Option<GestureSymbol>,
}

const FINGER_JOINTS: [(usize, usize); 4] = [
    (INDEX_TIP, INDEX_PIP),
    (MIDDLE_TIP, MIDDLE_PIP),
    (RING_TIP, RING_PIP),
    (PINKY_TIP, PINKY_PIP),
];

/// Evaluated top to bottom; the first rule that returns a symbol wins.
/// Categories overlap, so the order is part of the contract.
pub const RULES: &[GestureRule] = &[
    GestureRule {
        name: "open_palm",
        apply: |f| (f.total() == 5).then_some(GestureSymbol::Power),
    },
    GestureRule {
        name: "thumb_up",
        apply: |f| {
            (f.finger_count == 0 && f.thumb_extended && f.thumb_points_up())
                .then_some(GestureSymbol::VolumeUp)
        },
    },
    GestureRule {
        name: "thumb_down",
        apply: |f| {
            (f.finger_count == 0 && f.thumb_extended && f.thumb_points_down())
                .then_some(GestureSymbol::VolumeDown)
        },
    },
    GestureRule {
        name: "fist",
        apply: |f| (f.finger_count == 0).then_some(GestureSymbol::Mute),
    },
    GestureRule {
        name: "pointing",
        apply: |f| {
            if f.finger_count != 1 || !f.index_extended() {
                return None;
            }
            let dx = f.index_tip.x - f.index_pip.x;
            if dx.abs() > f.pointing_threshold && dx < 0.0 {
                Some(GestureSymbol::ChannelPrev)
            } else {
                Some(GestureSymbol::ChannelNext)
            }
        },
    },
    GestureRule {
        name: "two_fingers",
        apply: |f| (f.finger_count == 2).then_some(GestureSymbol::ChannelPrev),
    },
    GestureRule {
        name: "three_fingers",
        apply: |f| (f.finger_count == 3).then_some(GestureSymbol::Source),
    },
    GestureRule {
        name: "four_fingers",
        apply: |f| (f.finger_count == 4).then_some(GestureSymbol::Power),
    },
];

/// Stateless per-frame pose classifier
#[derive(Debug, Clone, Default)]
pub struct GestureClassifier {
    config: ClassifierConfig,
}

impl GestureClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn features(&self, hand: &HandLandmarks) -> HandFeatures {
        let mut fingers = [false; 4];
        for (extended, (tip, pip)) in fingers.iter_mut().zip(FINGER_JOINTS) {
            *extended =
                is_extended_with_margin(hand, tip, pip, WRIST, self.config.extension_margin);
        }

        HandFeatures {
            fingers,
            finger_count: fingers.iter().filter(|&&up| up).count(),
            thumb_extended: distance(hand[THUMB_TIP], hand[INDEX_MCP])
                > self.config.thumb_extension_distance,
            thumb_tip: hand[THUMB_TIP],
            thumb_ip: hand[THUMB_IP],
            index_mcp: hand[INDEX_MCP],
            index_tip: hand[INDEX_TIP],
            index_pip: hand[INDEX_PIP],
            pointing_threshold: self.config.pointing_threshold,
        }
    }

    /// Classify a hand, also reporting which rule fired
    pub fn classify_with_rule(
        &self,
        hand: &HandLandmarks,
    ) -> (GestureSymbol, Option<&'static str>) {
        let features = self.features(hand);
        for rule in RULES {
            if let Some(symbol) = (rule.apply)(&features) {
                trace!(
                    "Rule '{}' matched (fingers: {}, thumb: {}) -> {}",
                    rule.name,
                    features.finger_count,
                    features.thumb_extended,
                    symbol
                );
                return (symbol, Some(rule.name));
            }
        }
        (GestureSymbol::None, None)
    }

    pub fn classify(&self, hand: &HandLandmarks) -> GestureSymbol {
        self.classify_with_rule(hand).0
    }

    /// A frame without a hand classifies as `None`
    pub fn classify_frame(&self, frame: &HandFrame) -> GestureSymbol {
        frame
            .hand
            .as_ref()
            .map_or(GestureSymbol::None, |hand| self.classify(hand))
    }
}

/// Classify with default thresholds
pub fn classify(hand: &HandLandmarks) -> GestureSymbol {
    GestureClassifier::default().classify(hand)
}
