//! Heuristic deepfake scoring over raw image metrics
//!
//! Each metric gets a "naturalness" sub-score from a bell curve centred on
//! values typical of real camera photos, with extra penalties for the extremes
//! synthetic images tend to hit (over-sharp, too smooth, too clean, too uniform).
//! The weighted sub-scores form an authenticity score; its complement is the
//! manipulation probability.

use crate::models::{DeepfakeMetrics, DeepfakeVerdict};

/// Probability (percent) above which a selfie is flagged.
pub const DEEPFAKE_THRESHOLD: f64 = 45.0;

const SHARPNESS_WEIGHT: f64 = 0.15;
const NOISE_WEIGHT: f64 = 0.20;
const ARTIFACT_WEIGHT: f64 = 0.30;
const CONSISTENCY_WEIGHT: f64 = 0.25;
const COLOR_WEIGHT: f64 = 0.10;

/// Per-metric naturalness scores, each in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubScores {
    pub sharpness: f64,
    pub noise: f64,
    pub artifacts: f64,
    pub consistency: f64,
    pub color: f64,
}

impl SubScores {
    pub fn authenticity(&self) -> f64 {
        self.sharpness * SHARPNESS_WEIGHT
            + self.noise * NOISE_WEIGHT
            + self.artifacts * ARTIFACT_WEIGHT
            + self.consistency * CONSISTENCY_WEIGHT
            + self.color * COLOR_WEIGHT
    }
}

/// 1.0 at `center`, falling linearly to 0.0 at `center ± width`.
pub fn bell(x: f64, center: f64, width: f64) -> f64 {
    if width <= 0.0 {
        return 0.0;
    }
    (1.0 - ((x - center).abs() / width).min(1.0)).max(0.0)
}

pub fn sub_scores(metrics: &DeepfakeMetrics) -> SubScores {
    let sharp = finite_or_zero(metrics.sharpness);
    let noise = finite_or_zero(metrics.noise_level);
    let artifacts = finite_or_zero(metrics.artifact_score);
    let consistency = finite_or_zero(metrics.consistency_score).clamp(0.0, 1.0);
    let color = finite_or_zero(metrics.color_variance);

    // Real photos sit around 100-400; generators overshoot.
    let mut sharpness_score = bell(sharp, 200.0, 180.0);
    if sharp > 500.0 {
        sharpness_score *= 0.5;
    }

    // Suspiciously smooth skin.
    let mut noise_score = bell(noise, 25.0, 15.0);
    if noise < 12.0 {
        noise_score *= 0.4;
    }

    let mut color_score = bell(color, 45.0, 20.0);
    if !(30.0..=70.0).contains(&color) {
        color_score *= 0.6;
    }

    // Too clean for a recompressed camera JPEG.
    let mut artifact_score = bell(artifacts, 8.0, 10.0);
    if artifacts < 3.0 {
        artifact_score *= 0.5;
    }

    SubScores {
        sharpness: sharpness_score,
        noise: noise_score,
        artifacts: artifact_score,
        consistency,
        color: color_score,
    }
}

/// Maps the five raw metrics to a manipulation probability and flag.
pub fn score_deepfake(metrics: &DeepfakeMetrics) -> DeepfakeVerdict {
    let scores = sub_scores(metrics);
    let probability = ((1.0 - scores.authenticity()) * 100.0).clamp(0.0, 100.0);
    let is_deepfake = probability > DEEPFAKE_THRESHOLD;
    let confidence = if is_deepfake {
        probability
    } else {
        100.0 - probability
    };

    tracing::debug!(
        "Deepfake scoring: probability={:.2}, flagged={}, sub_scores={:?}",
        probability,
        is_deepfake,
        scores
    );

    DeepfakeVerdict {
        probability,
        is_deepfake,
        confidence,
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
