// src/main.rs - Demo driver: load a model, feed it landmark frames, log predictions
use anyhow::{Context, Result};
use std::env;
use std::f32::consts::TAU;
use std::time::Duration;

use sign_motion::landmarks::LANDMARKS_PER_HAND;
use sign_motion::{
    ClassificationModel, HandDetection, HandFrame, Handedness, LandmarkPoint, ModelCategory,
    ModelLoader, MotionClassifier, Prediction, SequenceBuffer,
};

const TICK_INTERVAL: Duration = Duration::from_millis(33);
const SIMULATION_TICKS: usize = 120;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage: {} <model-file | base-url> [category] [replay-file]",
            args[0]
        );
        eprintln!("  category: alphabet | number | words (default: words)");
        eprintln!("  replay-file: JSON array of hand frames; omitted = simulated motion");
        std::process::exit(1);
    }

    let source = &args[1];
    let category: ModelCategory = args
        .get(2)
        .map(String::as_str)
        .unwrap_or("words")
        .parse()?;

    let mut classifier = MotionClassifier::new();
    let token = classifier.begin_load();
    let model = if source.starts_with("http://") || source.starts_with("https://") {
        let loader = ModelLoader::new(source);
        loader.fetch(category).await?
    } else {
        ClassificationModel::from_file(source)
            .with_context(|| format!("loading model from {}", source))?
    };
    classifier.install_model(token, model);

    match args.get(3) {
        Some(path) => replay_file(&mut classifier, path).await?,
        None => simulate_motion(&mut classifier).await,
    }

    Ok(())
}

/// Replay a recorded landmark session through the full pipeline.
async fn replay_file(classifier: &mut MotionClassifier, path: &str) -> Result<()> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading replay file {}", path))?;
    let frames: Vec<HandFrame> = serde_json::from_str(&content).context("parsing replay frames")?;
    tracing::info!("replaying {} frames from {}", frames.len(), path);

    let mut buffer = SequenceBuffer::new(classifier.config().sequence_length);
    for frame in frames {
        buffer.append(frame);
        report(classifier.predict(buffer.snapshot()));
        tokio::time::sleep(TICK_INTERVAL).await;
    }
    Ok(())
}

/// Drive the pipeline with a synthetic circular one-hand motion when no
/// recording is available.
async fn simulate_motion(classifier: &mut MotionClassifier) {
    tracing::info!("no replay file given, simulating circular hand motion");

    let mut buffer = SequenceBuffer::new(classifier.config().sequence_length);
    for tick in 0..SIMULATION_TICKS {
        let theta = tick as f32 / 30.0 * TAU;
        buffer.append(simulated_frame(theta));
        report(classifier.predict(buffer.snapshot()));
        tokio::time::sleep(TICK_INTERVAL).await;
    }
}

fn simulated_frame(theta: f32) -> HandFrame {
    let wrist_x = 0.5 + 0.15 * theta.cos();
    let wrist_y = 0.5 + 0.15 * theta.sin();

    // Full 21-point set in a small grid hanging off the wrist, enough to
    // exercise the fingertip-spread features
    let landmarks = (0..LANDMARKS_PER_HAND)
        .map(|i| {
            LandmarkPoint::new(
                wrist_x + (i % 5) as f32 * 0.02,
                wrist_y + (i / 5) as f32 * 0.02,
                0.0,
            )
        })
        .collect();

    HandFrame {
        hands: vec![HandDetection {
            handedness: Handedness::Right,
            landmarks,
            confidence: 0.95,
        }],
    }
}

fn report(prediction: Prediction) {
    match &prediction {
        Prediction::Sign { label, confidence } => {
            tracing::info!("recognized '{}' (confidence {:.2})", label, confidence);
        }
        Prediction::Error => tracing::warn!("inference error"),
        // Cooldown and low-confidence ticks are expected at this rate
        other => tracing::debug!("{}", other.label()),
    }
}
