use serde::{Deserialize, Serialize};

/// Number of landmarks the detector reports per hand
pub const LANDMARK_COUNT: usize = 21;

// Anatomical landmark indices
pub const WRIST: usize = 0;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_TIP: usize = 12;
pub const RING_PIP: usize = 14;
pub const RING_TIP: usize = 16;
pub const PINKY_PIP: usize = 18;
pub const PINKY_TIP: usize = 20;

/// A single normalized hand point. `x` and `y` are image space in [0, 1]
/// with the origin at the top-left, so smaller `y` is higher on screen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<[f32; 3]> for Landmark {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

/// The 21 landmarks of one detected hand
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandLandmarks {
    points: [Landmark; LANDMARK_COUNT],
}

impl HandLandmarks {
    pub fn new(points: [Landmark; LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    /// Build from a detector slice; `None` unless exactly 21 points are given
    pub fn from_slice(points: &[Landmark]) -> Option<Self> {
        let points: [Landmark; LANDMARK_COUNT] = points.try_into().ok()?;
        Some(Self { points })
    }

    pub fn get(&self, index: usize) -> Landmark {
        self.points[index]
    }

    pub fn set(&mut self, index: usize, landmark: Landmark) {
        self.points[index] = landmark;
    }

    pub fn points(&self) -> &[Landmark; LANDMARK_COUNT] {
        &self.points
    }
}

impl std::ops::Index<usize> for HandLandmarks {
    type Output = Landmark;

    fn index(&self, index: usize) -> &Landmark {
        &self.points[index]
    }
}

/// One processed camera frame: zero or one hand
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HandFrame {
    pub hand: Option<HandLandmarks>,
}

impl HandFrame {
    pub fn empty() -> Self {
        Self { hand: None }
    }

    pub fn with_hand(hand: HandLandmarks) -> Self {
        Self { hand: Some(hand) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_requires_21_points() {
        let short = vec![Landmark::default(); 20];
        assert!(HandLandmarks::from_slice(&short).is_none());

        let full: Vec<Landmark> = (0..LANDMARK_COUNT)
            .map(|i| Landmark::new(i as f32 / 21.0, 0.5, 0.0))
            .collect();
        let hand = HandLandmarks::from_slice(&full).unwrap();
        assert_eq!(hand[PINKY_TIP].x, 20.0 / 21.0);
        assert_eq!(hand.get(WRIST), Landmark::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn test_landmark_from_array() {
        let lm: Landmark = [0.1, 0.2, 0.3].into();
        assert_eq!(lm, Landmark::new(0.1, 0.2, 0.3));
    }
}
