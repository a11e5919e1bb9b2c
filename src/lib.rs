// src/lib.rs - Motion sign recognition core
//
// Pipeline: sequence buffer -> feature extractor -> scaler -> tree ensemble
// -> prediction gate. Camera capture and hand-landmark detection live
// upstream and hand this crate `HandFrame` values once per tick.

pub mod classifier;
pub mod features;
pub mod landmarks;
pub mod model;

pub use classifier::{ClassifierConfig, LoadToken, MotionClassifier, Prediction};
pub use features::{extract_features, FeatureVector, HandMotionBlock, FEATURE_COUNT};
pub use landmarks::{HandDetection, HandFrame, Handedness, LandmarkPoint, SequenceBuffer};
pub use model::{
    ClassificationModel, ModelCategory, ModelError, ModelLoader, ScalerParams,
};
