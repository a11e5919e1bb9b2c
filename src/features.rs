// src/features.rs - Temporal motion features from a hand landmark sequence
use crate::landmarks::{HandFrame, FINGERTIPS};
use nalgebra::Vector2;
use std::f32::consts::PI;

/// Features per hand slot.
pub const HAND_FEATURE_COUNT: usize = 14;

/// Hand-synchronization features, computed once for the whole sequence.
pub const SYNC_FEATURE_COUNT: usize = 2;

/// Total feature dimensionality: two hand blocks plus synchronization.
pub const FEATURE_COUNT: usize = 2 * HAND_FEATURE_COUNT + SYNC_FEATURE_COUNT;

/// Minimum frames before extraction produces anything.
pub const MIN_SEQUENCE_FRAMES: usize = 3;

/// Guard against division by zero in spread and sync normalization.
const EPSILON: f32 = 0.001;

pub type FeatureVector = [f32; FEATURE_COUNT];

/// Per-hand feature block. A hand slot that was never meaningfully tracked
/// degrades to `Zeroed` rather than an error; the distinction is kept visible
/// here instead of being swallowed inside the extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HandMotionBlock {
    Zeroed,
    Computed([f32; HAND_FEATURE_COUNT]),
}

impl HandMotionBlock {
    pub fn values(&self) -> [f32; HAND_FEATURE_COUNT] {
        match self {
            HandMotionBlock::Zeroed => [0.0; HAND_FEATURE_COUNT],
            HandMotionBlock::Computed(values) => *values,
        }
    }
}

/// Extract the 30-dimensional motion feature vector from a landmark sequence.
///
/// Returns `None` when fewer than 3 frames are buffered; that is the
/// "insufficient data" signal, not an error. The output ordering is a
/// positional contract with the fitted scaler and trees: hand slot 0 block,
/// hand slot 1 block, then the two synchronization features.
pub fn extract_features(frames: &[HandFrame]) -> Option<FeatureVector> {
    if frames.len() < MIN_SEQUENCE_FRAMES {
        return None;
    }

    let mut features = [0.0f32; FEATURE_COUNT];
    for slot in 0..2 {
        let block = extract_hand_block(frames, slot);
        features[slot * HAND_FEATURE_COUNT..(slot + 1) * HAND_FEATURE_COUNT]
            .copy_from_slice(&block.values());
    }

    let (coupling, velocity_diff) = extract_sync_features(frames);
    features[2 * HAND_FEATURE_COUNT] = coupling;
    features[2 * HAND_FEATURE_COUNT + 1] = velocity_diff;

    Some(features)
}

/// 14 motion features for one hand slot.
///
/// Wrist samples are collected from every frame where the slot is present;
/// frames where the hand dropped out do not contribute a sample, so velocity
/// steps bridge the gap between the surrounding detections.
fn extract_hand_block(frames: &[HandFrame], slot: usize) -> HandMotionBlock {
    let positions: Vec<Vector2<f32>> = frames
        .iter()
        .filter_map(|frame| frame.hand(slot).and_then(|hand| hand.wrist()))
        .collect();

    if positions.len() < 2 {
        return HandMotionBlock::Zeroed;
    }

    let velocities: Vec<f32> = positions
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).norm())
        .collect();

    let directions: Vec<f32> = positions
        .windows(2)
        .map(|pair| {
            let step = pair[1] - pair[0];
            step.y.atan2(step.x)
        })
        .collect();

    let x_coords: Vec<f32> = positions.iter().map(|p| p.x).collect();
    let y_coords: Vec<f32> = positions.iter().map(|p| p.y).collect();

    let mut features = [0.0f32; HAND_FEATURE_COUNT];
    features[0] = max(&velocities);
    features[1] = mean(&velocities);
    features[2] = population_std(&velocities);
    features[3] = count_peaks(&velocities) as f32;
    features[4] = angular_variance(&directions);
    features[5] = straightness(&positions);
    features[6] = circularity(&positions);
    features[7] = max(&x_coords) - min(&x_coords);
    features[8] = max(&y_coords) - min(&y_coords);
    features[9..14].copy_from_slice(&spread_features(frames, slot));

    HandMotionBlock::Computed(features)
}

/// 5 hand-configuration features from inter-fingertip spread, over the frames
/// where this slot carries a full 21-point landmark set.
fn spread_features(frames: &[HandFrame], slot: usize) -> [f32; 5] {
    let spreads: Vec<f32> = frames
        .iter()
        .filter_map(|frame| frame.hand(slot))
        .filter(|hand| hand.is_complete())
        .map(|hand| {
            FINGERTIPS
                .windows(2)
                .map(|pair| {
                    let tip1 = hand.landmarks[pair[0]].xy();
                    let tip2 = hand.landmarks[pair[1]].xy();
                    (tip2 - tip1).norm()
                })
                .sum::<f32>()
        })
        .collect();

    if spreads.is_empty() {
        return [0.0; 5];
    }

    let spread_mean = mean(&spreads);
    let spread_max = max(&spreads);
    let spread_min = min(&spreads);
    [
        spread_mean,
        population_std(&spreads),
        spread_max,
        spread_min,
        (spread_max - spread_min) / (spread_mean + EPSILON),
    ]
}

/// Hand-synchronization features: an unnormalized velocity coupling score and
/// the absolute difference of mean velocities.
///
/// Unlike the per-hand blocks, only consecutive-frame pairs where the slot is
/// present in both frames contribute a velocity sample here.
fn extract_sync_features(frames: &[HandFrame]) -> (f32, f32) {
    let slot_velocities = |slot: usize| -> Vec<f32> {
        frames
            .windows(2)
            .filter_map(|pair| {
                let prev = pair[0].hand(slot).and_then(|hand| hand.wrist())?;
                let curr = pair[1].hand(slot).and_then(|hand| hand.wrist())?;
                Some((curr - prev).norm())
            })
            .collect()
    };

    let left = slot_velocities(0);
    let right = slot_velocities(1);

    if left.is_empty() || right.is_empty() {
        return (0.0, 0.0);
    }

    let min_len = left.len().min(right.len());
    let correlation: f32 = left
        .iter()
        .zip(right.iter())
        .take(min_len)
        .map(|(a, b)| a * b)
        .sum();

    (
        correlation / (min_len as f32 + EPSILON),
        (mean(&left) - mean(&right)).abs(),
    )
}

// ========== Statistics helpers ==========

fn mean(data: &[f32]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f32>() / data.len() as f32
}

fn population_std(data: &[f32]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f32>() / data.len() as f32;
    variance.sqrt()
}

fn max(data: &[f32]) -> f32 {
    data.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b))
}

fn min(data: &[f32]) -> f32 {
    data.iter().fold(f32::INFINITY, |a, &b| a.min(b))
}

/// Local maxima over strictly interior indices.
fn count_peaks(data: &[f32]) -> usize {
    let mut peaks = 0;
    for i in 1..data.len().saturating_sub(1) {
        if data[i] > data[i - 1] && data[i] > data[i + 1] {
            peaks += 1;
        }
    }
    peaks
}

/// Mean wrapped-absolute angular difference between consecutive movement
/// directions. Differences above pi wrap to the shortest arc.
fn angular_variance(directions: &[f32]) -> f32 {
    if directions.len() < 2 {
        return 0.0;
    }
    let changes: Vec<f32> = directions
        .windows(2)
        .map(|pair| {
            let diff = (pair[1] - pair[0]).abs();
            if diff > PI {
                2.0 * PI - diff
            } else {
                diff
            }
        })
        .collect();
    mean(&changes)
}

/// Direct first-to-last distance over total path length; 0 for a degenerate
/// zero-length path. Bounded by [0, 1] via the triangle inequality.
fn straightness(positions: &[Vector2<f32>]) -> f32 {
    if positions.len() < 2 {
        return 0.0;
    }
    let total: f32 = positions
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).norm())
        .sum();
    if total <= 0.0 {
        return 0.0;
    }
    let direct = (positions[positions.len() - 1] - positions[0]).norm();
    direct / total
}

/// How evenly positions sit on a circle around their centroid, clamped to
/// [0, 1]. Needs at least 4 positions to be meaningful.
fn circularity(positions: &[Vector2<f32>]) -> f32 {
    if positions.len() < 4 {
        return 0.0;
    }
    let center = positions.iter().sum::<Vector2<f32>>() / positions.len() as f32;
    let radii: Vec<f32> = positions.iter().map(|p| (p - center).norm()).collect();
    let avg_radius = mean(&radii);
    if avg_radius == 0.0 {
        return 0.0;
    }
    (1.0 - population_std(&radii) / avg_radius).clamp(0.0, 1.0)
}
