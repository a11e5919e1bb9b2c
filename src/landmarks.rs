// src/landmarks.rs - Hand landmark frames and the bounded sequence window
use nalgebra::Vector2;
use serde::Deserialize;

/// Number of keypoints the hand tracker reports per hand.
pub const LANDMARKS_PER_HAND: usize = 21;

/// Landmark index of the wrist keypoint.
pub const WRIST: usize = 0;

/// Fingertip landmark indices: thumb, index, middle, ring, pinky.
pub const FINGERTIPS: [usize; 5] = [4, 8, 12, 16, 20];

/// Default number of frames kept for temporal feature extraction.
pub const DEFAULT_SEQUENCE_LENGTH: usize = 12;

/// A single tracked keypoint in normalized image space (z is relative depth).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl LandmarkPoint {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Image-plane position; path features are 2D only.
    pub fn xy(&self) -> Vector2<f32> {
        Vector2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

/// One detected hand in a frame.
#[derive(Debug, Clone, Deserialize)]
pub struct HandDetection {
    /// Left/Right label reported by the detector (`label` on the wire).
    #[serde(alias = "label")]
    pub handedness: Handedness,
    pub landmarks: Vec<LandmarkPoint>,
    pub confidence: f32,
}

impl HandDetection {
    /// Wrist position, if the landmark list carries one.
    pub fn wrist(&self) -> Option<Vector2<f32>> {
        self.landmarks.get(WRIST).map(LandmarkPoint::xy)
    }

    /// Whether this detection carries the full 21-point landmark set.
    pub fn is_complete(&self) -> bool {
        self.landmarks.len() >= LANDMARKS_PER_HAND
    }
}

/// All hands detected at one instant.
///
/// Hands are positionally indexed: slot 0 and slot 1 are array positions in
/// the detector's output order, not stable physical-hand identities. When
/// detection drops and reacquires a hand it may land in the other slot. The
/// feature extractor depends on this exact semantic; do not re-key by
/// handedness label.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandFrame {
    #[serde(default)]
    pub hands: Vec<HandDetection>,
}

impl HandFrame {
    pub fn empty() -> Self {
        Self { hands: Vec::new() }
    }

    /// Detection in the given slot, if present this frame.
    pub fn hand(&self, slot: usize) -> Option<&HandDetection> {
        self.hands.get(slot)
    }
}

/// Bounded, time-ordered window of hand frames (oldest first).
///
/// Frames with zero detected hands are still appended so temporal spacing is
/// preserved. Called once per detection tick; no interior locking.
#[derive(Debug, Clone)]
pub struct SequenceBuffer {
    frames: Vec<HandFrame>,
    capacity: usize,
}

impl SequenceBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append the newest frame, evicting the oldest once the window is full.
    pub fn append(&mut self, frame: HandFrame) {
        if self.frames.len() == self.capacity {
            self.frames.remove(0);
        }
        self.frames.push(frame);
    }

    /// Read-only view of the current window, oldest to newest.
    pub fn snapshot(&self) -> &[HandFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drop all frames. Used when detection restarts.
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl Default for SequenceBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SEQUENCE_LENGTH)
    }
}
