// src/classifier.rs - Prediction gate around the motion feature pipeline
use crate::features::extract_features;
use crate::landmarks::{HandFrame, DEFAULT_SEQUENCE_LENGTH};
use crate::model::{scale_features, ClassificationModel, ModelCategory, ModelError, ModelLoader};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Frames kept in the temporal window.
    pub sequence_length: usize,
    /// Winning vote share below this is suppressed.
    pub min_confidence: f32,
    /// Minimum interval between two accepted predictions.
    pub cooldown: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            sequence_length: DEFAULT_SEQUENCE_LENGTH,
            min_confidence: 0.4,
            cooldown: Duration::from_millis(150),
        }
    }
}

/// Outcome of one prediction tick. Sentinel variants are gate-level
/// outcomes, not model classes, and always carry zero confidence; callers
/// can treat them as UI states rather than errors.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    Sign { label: String, confidence: f32 },
    /// No model installed, or a load still in flight.
    ModelNotReady,
    /// Suppressed by the cooldown interval.
    CoolingDown,
    /// Fewer than the minimum buffered frames.
    NoFeatures,
    /// Winning vote share below the confidence threshold.
    Uncertain,
    /// Internal inference failure, downgraded rather than propagated.
    Error,
}

impl Prediction {
    pub fn label(&self) -> &str {
        match self {
            Prediction::Sign { label, .. } => label,
            Prediction::ModelNotReady => "model_error",
            Prediction::CoolingDown => "cooling_down",
            Prediction::NoFeatures => "no_features",
            Prediction::Uncertain => "uncertain",
            Prediction::Error => "error",
        }
    }

    pub fn confidence(&self) -> f32 {
        match self {
            Prediction::Sign { confidence, .. } => *confidence,
            _ => 0.0,
        }
    }

    pub fn is_sign(&self) -> bool {
        matches!(self, Prediction::Sign { .. })
    }
}

/// Opaque handle for one model-load request. Installing with a superseded
/// token is a no-op, so a stale load that completes late cannot overwrite a
/// newer model (last-requested-wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadToken(u64);

/// Motion sign classifier: holds the installed model and the cooldown state,
/// and runs extract -> scale -> classify behind the prediction gate.
///
/// Single-threaded by design; one `predict` call runs to completion per
/// detection tick. Model installation swaps the whole model at once so a
/// partially-initialized model is never visible to `predict`.
pub struct MotionClassifier {
    config: ClassifierConfig,
    model: Option<ClassificationModel>,
    last_prediction: Option<Instant>,
    load_generation: u64,
}

impl MotionClassifier {
    pub fn new() -> Self {
        Self::with_config(ClassifierConfig::default())
    }

    pub fn with_config(config: ClassifierConfig) -> Self {
        Self {
            config,
            model: None,
            last_prediction: None,
            load_generation: 0,
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Option<&ClassificationModel> {
        self.model.as_ref()
    }

    /// Register a new load request, superseding any in-flight one.
    pub fn begin_load(&mut self) -> LoadToken {
        self.load_generation += 1;
        LoadToken(self.load_generation)
    }

    /// Install a loaded model if its request is still the newest one.
    /// Returns whether the install took effect.
    pub fn install_model(&mut self, token: LoadToken, model: ClassificationModel) -> bool {
        if token.0 != self.load_generation {
            tracing::debug!("discarding stale model load (token {})", token.0);
            return false;
        }
        tracing::info!(
            "installed model: {} classes, {} trees",
            model.class_names().len(),
            model.tree_count()
        );
        self.model = Some(model);
        true
    }

    /// Fetch and install a category's model. On failure the previously
    /// installed model, if any, stays in place.
    pub async fn load(
        &mut self,
        loader: &ModelLoader,
        category: ModelCategory,
    ) -> Result<(), ModelError> {
        let token = self.begin_load();
        let model = loader.fetch(category).await?;
        self.install_model(token, model);
        Ok(())
    }

    /// Classify the current landmark window.
    pub fn predict(&mut self, frames: &[HandFrame]) -> Prediction {
        self.predict_at(Instant::now(), frames)
    }

    /// Gate sequence for one tick: model check, cooldown, extraction,
    /// scaling, ensemble vote, confidence threshold. The cooldown check runs
    /// before extraction so suppressed ticks cost nothing.
    pub fn predict_at(&mut self, now: Instant, frames: &[HandFrame]) -> Prediction {
        let Some(model) = self.model.as_ref() else {
            return Prediction::ModelNotReady;
        };

        if let Some(last) = self.last_prediction {
            if now.duration_since(last) < self.config.cooldown {
                return Prediction::CoolingDown;
            }
        }

        let Some(features) = extract_features(frames) else {
            return Prediction::NoFeatures;
        };

        let scaled = scale_features(Some(model.scaler()), &features);
        let vote = match model.classify(&scaled) {
            Ok(vote) => vote,
            Err(err) => {
                tracing::warn!("inference failed: {}", err);
                return Prediction::Error;
            }
        };

        if vote.confidence < self.config.min_confidence {
            return Prediction::Uncertain;
        }

        let Some(label) = model.class_name(vote.class_index) else {
            // Unreachable for a validated model; downgrade all the same
            tracing::warn!("vote for unknown class index {}", vote.class_index);
            return Prediction::Error;
        };

        let prediction = Prediction::Sign {
            label: label.to_string(),
            confidence: vote.confidence,
        };
        self.last_prediction = Some(now);
        prediction
    }
}

impl Default for MotionClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_COUNT;
    use crate::landmarks::{HandDetection, Handedness, LandmarkPoint};
    use crate::model::{DecisionTree, ScalerParams, TreeNode};

    fn leaf(prediction: usize) -> DecisionTree {
        DecisionTree {
            root: TreeNode::Leaf { prediction },
        }
    }

    fn identity_scaler() -> ScalerParams {
        ScalerParams {
            mean: vec![0.0; FEATURE_COUNT],
            scale: vec![0.999; FEATURE_COUNT],
        }
    }

    fn install(classifier: &mut MotionClassifier, trees: Vec<DecisionTree>, classes: &[&str]) {
        let model = ClassificationModel::from_parts(
            trees,
            identity_scaler(),
            classes.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap();
        let token = classifier.begin_load();
        assert!(classifier.install_model(token, model));
    }

    /// Four frames of steady rightward wrist motion, 0.2 per step, so the
    /// extracted peak velocity (feature 0) is 0.2.
    fn moving_hand_frames() -> Vec<HandFrame> {
        (0..4)
            .map(|i| HandFrame {
                hands: vec![HandDetection {
                    handedness: Handedness::Right,
                    landmarks: vec![LandmarkPoint::new(i as f32 * 0.2, 0.3, 0.0)],
                    confidence: 0.9,
                }],
            })
            .collect()
    }

    #[test]
    fn test_no_model_means_not_ready() {
        let mut classifier = MotionClassifier::new();
        let result = classifier.predict_at(Instant::now(), &moving_hand_frames());
        assert_eq!(result, Prediction::ModelNotReady);
        assert_eq!(result.label(), "model_error");
        assert_eq!(result.confidence(), 0.0);
    }

    #[test]
    fn test_short_sequence_means_no_features() {
        let mut classifier = MotionClassifier::new();
        install(&mut classifier, vec![leaf(0)], &["hello"]);
        let frames = moving_hand_frames()[..2].to_vec();
        assert_eq!(
            classifier.predict_at(Instant::now(), &frames),
            Prediction::NoFeatures
        );
    }

    #[test]
    fn test_cooldown_suppresses_second_call() {
        let mut classifier = MotionClassifier::new();
        install(&mut classifier, vec![leaf(0)], &["hello"]);
        let frames = moving_hand_frames();

        let t0 = Instant::now();
        assert!(classifier.predict_at(t0, &frames).is_sign());

        // 100ms later: inside the 150ms cooldown, even though the gesture
        // would classify confidently
        let second = classifier.predict_at(t0 + Duration::from_millis(100), &frames);
        assert_eq!(second, Prediction::CoolingDown);
        assert_eq!(second.confidence(), 0.0);

        // Past the cooldown the gate opens again
        assert!(classifier
            .predict_at(t0 + Duration::from_millis(200), &frames)
            .is_sign());
    }

    #[test]
    fn test_cooldown_not_refreshed_by_suppressed_calls() {
        let mut classifier = MotionClassifier::new();
        install(&mut classifier, vec![leaf(0)], &["hello"]);
        let frames = moving_hand_frames();

        let t0 = Instant::now();
        assert!(classifier.predict_at(t0, &frames).is_sign());
        assert_eq!(
            classifier.predict_at(t0 + Duration::from_millis(140), &frames),
            Prediction::CoolingDown
        );
        // The suppressed call at 140ms must not have reset the timer
        assert!(classifier
            .predict_at(t0 + Duration::from_millis(160), &frames)
            .is_sign());
    }

    #[test]
    fn test_low_vote_share_is_uncertain() {
        let mut classifier = MotionClassifier::new();
        // 10 trees, best class gets 3 votes: share 0.3 < 0.4
        let trees = vec![
            leaf(0), leaf(0), leaf(0),
            leaf(1), leaf(1), leaf(1),
            leaf(2), leaf(2), leaf(2),
            leaf(3),
        ];
        install(&mut classifier, trees, &["a", "b", "c", "d"]);

        let result = classifier.predict_at(Instant::now(), &moving_hand_frames());
        assert_eq!(result, Prediction::Uncertain);
        // The raw 0.3 share is deliberately not reported
        assert_eq!(result.confidence(), 0.0);
    }

    #[test]
    fn test_uncertain_does_not_start_cooldown() {
        let mut classifier = MotionClassifier::new();
        let trees = vec![leaf(0), leaf(1), leaf(2)];
        install(&mut classifier, trees, &["a", "b", "c"]);

        let t0 = Instant::now();
        assert_eq!(
            classifier.predict_at(t0, &moving_hand_frames()),
            Prediction::Uncertain
        );
        // An immediately following call is not cooling down
        assert_eq!(
            classifier.predict_at(t0 + Duration::from_millis(1), &moving_hand_frames()),
            Prediction::Uncertain
        );
    }

    #[test]
    fn test_two_tree_tie_resolves_to_first_class() {
        let mut classifier = MotionClassifier::new();
        // Tree 1 predicts class 0 when scaled feature 0 <= 0.5, else class 1;
        // tree 2 always predicts class 1
        let split_tree = DecisionTree {
            root: TreeNode::Split {
                feature_index: 0,
                threshold: 0.5,
                left: Box::new(TreeNode::Leaf { prediction: 0 }),
                right: Box::new(TreeNode::Leaf { prediction: 1 }),
            },
        };
        install(&mut classifier, vec![split_tree, leaf(1)], &["wave", "point"]);

        // Peak velocity 0.2 with an identity scaler: tree 1 votes class 0,
        // tree 2 votes class 1, tie resolves to class 0 at confidence 0.5,
        // which clears the 0.4 threshold
        let result = classifier.predict_at(Instant::now(), &moving_hand_frames());
        assert_eq!(
            result,
            Prediction::Sign {
                label: "wave".to_string(),
                confidence: 0.5,
            }
        );
    }

    #[test]
    fn test_repeated_prediction_is_deterministic() {
        let frames = moving_hand_frames();
        let mut first = MotionClassifier::new();
        let mut second = MotionClassifier::new();
        install(&mut first, vec![leaf(0)], &["hello"]);
        install(&mut second, vec![leaf(0)], &["hello"]);

        assert_eq!(
            first.predict_at(Instant::now(), &frames),
            second.predict_at(Instant::now(), &frames)
        );
    }

    #[test]
    fn test_stale_load_is_discarded() {
        let mut classifier = MotionClassifier::new();

        let first_model = ClassificationModel::from_parts(
            vec![leaf(0)],
            identity_scaler(),
            vec!["old".to_string()],
        )
        .unwrap();
        let second_model = ClassificationModel::from_parts(
            vec![leaf(0)],
            identity_scaler(),
            vec!["new".to_string()],
        )
        .unwrap();

        // Two load requests issued back to back; the first completes last
        let stale = classifier.begin_load();
        let current = classifier.begin_load();

        assert!(classifier.install_model(current, second_model));
        assert!(!classifier.install_model(stale, first_model));

        // The newer request's model stays installed
        let result = classifier.predict_at(Instant::now(), &moving_hand_frames());
        assert_eq!(result.label(), "new");
    }

    #[test]
    fn test_failed_load_keeps_previous_model() {
        let mut classifier = MotionClassifier::new();
        install(&mut classifier, vec![leaf(0)], &["hello"]);

        // A load request whose fetch failed installs nothing
        let _abandoned = classifier.begin_load();
        assert!(classifier.model_loaded());
        let result = classifier.predict_at(Instant::now(), &moving_hand_frames());
        assert_eq!(result.label(), "hello");
    }
}
