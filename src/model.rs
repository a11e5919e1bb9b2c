// src/model.rs - Classification model artifact: trees, scaler, class names
use crate::features::{FeatureVector, FEATURE_COUNT};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model fetch returned HTTP {0}")]
    Status(u16),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed model JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("scaler dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("model artifact contains no trees")]
    EmptyEnsemble,

    #[error("model artifact contains no class names")]
    EmptyClassList,

    #[error("leaf predicts class {index} but only {classes} classes are defined")]
    ClassIndexOutOfRange { index: usize, classes: usize },

    #[error("tree node reads feature {index}, outside the feature vector")]
    FeatureIndexOutOfRange { index: usize },

    #[error("unknown model category '{0}'")]
    UnknownCategory(String),
}

/// Model artifact family. Each category is a separately trained forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelCategory {
    Alphabet,
    Number,
    Words,
}

impl ModelCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelCategory::Alphabet => "alphabet",
            ModelCategory::Number => "number",
            ModelCategory::Words => "words",
        }
    }
}

impl FromStr for ModelCategory {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alphabet" => Ok(ModelCategory::Alphabet),
            "number" => Ok(ModelCategory::Number),
            "words" => Ok(ModelCategory::Words),
            other => Err(ModelError::UnknownCategory(other.to_string())),
        }
    }
}

/// One decision-tree node, as serialized in the artifact. Internal nodes use
/// camelCase field names; the artifact's `isLeaf` markers are redundant with
/// the field shape and ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    #[serde(rename_all = "camelCase")]
    Split {
        feature_index: usize,
        threshold: f32,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf { prediction: usize },
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionTree {
    pub root: TreeNode,
}

impl DecisionTree {
    /// Walk root to leaf: branch left when the feature is <= the threshold.
    pub fn decide(&self, features: &FeatureVector) -> Result<usize, ModelError> {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { prediction } => return Ok(*prediction),
                TreeNode::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    let value = features
                        .get(*feature_index)
                        .ok_or(ModelError::FeatureIndexOutOfRange {
                            index: *feature_index,
                        })?;
                    node = if *value <= *threshold { left } else { right };
                }
            }
        }
    }
}

/// Per-dimension standardization parameters fitted alongside the forest.
#[derive(Debug, Clone, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

impl ScalerParams {
    /// `(v - mean) / (scale + 0.001)`; the offset guards a zero-variance
    /// dimension in the fitted model.
    pub fn transform(&self, features: &FeatureVector) -> FeatureVector {
        let mut scaled = [0.0f32; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            scaled[i] = (features[i] - self.mean[i]) / (self.scale[i] + 0.001);
        }
        scaled
    }
}

/// Standardize a feature vector, passing it through unchanged when no scaler
/// parameters are loaded.
pub fn scale_features(params: Option<&ScalerParams>, features: &FeatureVector) -> FeatureVector {
    match params {
        Some(scaler) => scaler.transform(features),
        None => *features,
    }
}

/// Raw artifact layout as fetched. `label_encoder` is opaque auxiliary data
/// from training and is not used for inference.
#[derive(Debug, Deserialize)]
struct RawModel {
    trees: Vec<DecisionTree>,
    scaler_mean: Vec<f32>,
    scaler_scale: Vec<f32>,
    classes: Vec<String>,
    #[serde(default)]
    #[allow(dead_code)]
    label_encoder: Option<serde_json::Value>,
}

/// Winning vote of a classification pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Vote {
    pub class_index: usize,
    pub confidence: f32,
}

/// A fully validated ensemble: trees, scaler and ordered class names.
/// Immutable once built; category switches replace the whole model.
#[derive(Debug, Clone)]
pub struct ClassificationModel {
    trees: Vec<DecisionTree>,
    scaler: ScalerParams,
    class_names: Vec<String>,
}

impl ClassificationModel {
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let raw: RawModel = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Build a model from already-deserialized parts, with the same
    /// validation as the artifact path.
    pub fn from_parts(
        trees: Vec<DecisionTree>,
        scaler: ScalerParams,
        class_names: Vec<String>,
    ) -> Result<Self, ModelError> {
        Self::from_raw(RawModel {
            trees,
            scaler_mean: scaler.mean,
            scaler_scale: scaler.scale,
            classes: class_names,
            label_encoder: None,
        })
    }

    /// Validate the artifact before anything can run inference against it.
    /// A mismatched or corrupt artifact is a load-time error, never a
    /// runtime one.
    fn from_raw(raw: RawModel) -> Result<Self, ModelError> {
        if raw.trees.is_empty() {
            return Err(ModelError::EmptyEnsemble);
        }
        if raw.classes.is_empty() {
            return Err(ModelError::EmptyClassList);
        }
        for dim in [raw.scaler_mean.len(), raw.scaler_scale.len()] {
            if dim != FEATURE_COUNT {
                return Err(ModelError::DimensionMismatch {
                    expected: FEATURE_COUNT,
                    actual: dim,
                });
            }
        }
        for tree in &raw.trees {
            validate_node(&tree.root, raw.classes.len())?;
        }

        Ok(Self {
            trees: raw.trees,
            scaler: ScalerParams {
                mean: raw.scaler_mean,
                scale: raw.scaler_scale,
            },
            class_names: raw.classes,
        })
    }

    pub fn scaler(&self) -> &ScalerParams {
        &self.scaler
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn class_name(&self, index: usize) -> Option<&str> {
        self.class_names.get(index).map(String::as_str)
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Majority vote across the ensemble. Votes are tallied into a fixed
    /// array indexed by class; the winner is the first class index reaching
    /// the strictly highest count, so ties resolve to the lower index.
    pub fn classify(&self, features: &FeatureVector) -> Result<Vote, ModelError> {
        let mut tally = vec![0usize; self.class_names.len()];
        for tree in &self.trees {
            let prediction = tree.decide(features)?;
            let slot = tally
                .get_mut(prediction)
                .ok_or(ModelError::ClassIndexOutOfRange {
                    index: prediction,
                    classes: self.class_names.len(),
                })?;
            *slot += 1;
        }

        let mut winner = 0;
        for (index, &votes) in tally.iter().enumerate() {
            if votes > tally[winner] {
                winner = index;
            }
        }

        Ok(Vote {
            class_index: winner,
            confidence: tally[winner] as f32 / self.trees.len() as f32,
        })
    }
}

fn validate_node(node: &TreeNode, class_count: usize) -> Result<(), ModelError> {
    match node {
        TreeNode::Leaf { prediction } => {
            if *prediction >= class_count {
                return Err(ModelError::ClassIndexOutOfRange {
                    index: *prediction,
                    classes: class_count,
                });
            }
            Ok(())
        }
        TreeNode::Split {
            feature_index,
            left,
            right,
            ..
        } => {
            if *feature_index >= FEATURE_COUNT {
                return Err(ModelError::FeatureIndexOutOfRange {
                    index: *feature_index,
                });
            }
            validate_node(left, class_count)?;
            validate_node(right, class_count)
        }
    }
}

/// Fetches model artifacts per category from the serving host.
pub struct ModelLoader {
    client: reqwest::Client,
    base_url: String,
}

impl ModelLoader {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch, parse and validate one category's model. A failure here leaves
    /// whatever model was previously installed untouched; installation is the
    /// caller's separate step.
    pub async fn fetch(&self, category: ModelCategory) -> Result<ClassificationModel, ModelError> {
        let url = format!(
            "{}/static/models/{}/model_data.json",
            self.base_url,
            category.as_str()
        );
        tracing::info!("loading {} motion model from {}", category.as_str(), url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ModelError::Status(response.status().as_u16()));
        }

        let raw: RawModel = response.json().await?;
        let model = ClassificationModel::from_raw(raw)?;
        tracing::info!(
            "{} motion model loaded: {} classes, {} trees",
            category.as_str(),
            model.class_names.len(),
            model.trees.len()
        );
        Ok(model)
    }
}
