//! Pure helpers over landmark coordinates.

use crate::landmark::{HandLandmarks, Landmark, WRIST};

/// Hysteresis factor for finger extension tests
pub const DEFAULT_EXTENSION_MARGIN: f32 = 1.1;

/// Euclidean distance in the image plane; `z` is ignored.
pub fn distance(a: Landmark, b: Landmark) -> f32 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// A finger is extended when its tip is clearly farther from the wrist than its PIP joint.
pub fn is_extended(hand: &HandLandmarks, tip: usize, pip: usize) -> bool {
    is_extended_with_margin(hand, tip, pip, WRIST, DEFAULT_EXTENSION_MARGIN)
}

/// Same as [`is_extended`] with an explicit reference point and margin.
/// NaN coordinates compare false and therefore read as "not extended".
pub fn is_extended_with_margin(
    hand: &HandLandmarks,
    tip: usize,
    pip: usize,
    wrist: usize,
    margin: f32,
) -> bool {
    let reference = hand[wrist];
    distance(hand[tip], reference) > margin * distance(hand[pip], reference)
}
