//! Text classifiers backing the analyzer endpoints
//!
//! A [`SequenceClassifier`] is the opaque model: text in, one score per label
//! out. A [`TextClassifierService`] wraps one of them with lazy loading,
//! result shaping and timing.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ModelError;

pub mod candle;
pub mod service;

pub use self::candle::{CandleLoader, CandleSequenceClassifier};
pub use service::TextClassifierService;

/// One score per label, as emitted by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f32, // 0..1
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// A loaded text-classification model.
pub trait SequenceClassifier: Send + Sync {
    /// Scores for every output class, in the model's label order.
    fn predict(&self, text: &str) -> Result<Vec<LabelScore>, ModelError>;
}

/// Builds a [`SequenceClassifier`]. May block for a long time (downloads, weight init).
pub trait ModelLoader: Send + Sync {
    fn load(&self) -> Result<Arc<dyn SequenceClassifier>, ModelError>;
}

impl<F> ModelLoader for F
where
    F: Fn() -> Result<Arc<dyn SequenceClassifier>, ModelError> + Send + Sync,
{
    fn load(&self) -> Result<Arc<dyn SequenceClassifier>, ModelError> {
        self()
    }
}

/// How raw label scores are reduced before leaving the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultShape {
    /// Keep every label.
    FullDistribution,
    /// Keep only the highest-scoring label.
    ArgMax,
}

/// Highest-scoring label and its confidence.
#[derive(ToSchema, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestLabel {
    pub label: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClassificationResult {
    Distribution(BTreeMap<String, f64>),
    Best(BestLabel),
}

impl ResultShape {
    pub fn apply(self, scores: Vec<LabelScore>) -> Result<ClassificationResult, ModelError> {
        match self {
            ResultShape::FullDistribution => Ok(ClassificationResult::Distribution(
                scores
                    .into_iter()
                    .map(|s| (s.label, round_score(s.score)))
                    .collect(),
            )),
            ResultShape::ArgMax => {
                // First label wins on ties.
                let best = scores
                    .into_iter()
                    .reduce(|best, s| if s.score > best.score { s } else { best })
                    .ok_or_else(|| ModelError::Inference("Model returned no labels".to_string()))?;
                Ok(ClassificationResult::Best(BestLabel {
                    confidence: round_score(best.score),
                    label: best.label,
                }))
            }
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Scores are reported with 4 decimals.
pub fn round_score(score: f32) -> f64 {
    round_to(score as f64, 4)
}

/// Wall-clock milliseconds since `start`, with 2 decimals.
pub fn elapsed_ms(start: Instant) -> f64 {
    round_to(start.elapsed().as_secs_f64() * 1000.0, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emotion_scores() -> Vec<LabelScore> {
        vec![
            LabelScore::new("anger", 0.012_345),
            LabelScore::new("joy", 0.912_36),
            LabelScore::new("sadness", 0.075_3),
        ]
    }

    #[test]
    fn test_full_distribution_keeps_every_label() {
        let result = ResultShape::FullDistribution.apply(emotion_scores()).unwrap();
        let ClassificationResult::Distribution(map) = result else {
            panic!("expected distribution");
        };

        assert_eq!(map.len(), 3);
        assert_eq!(map["anger"], 0.0123);
        assert_eq!(map["joy"], 0.9124);
        assert_eq!(map["sadness"], 0.0753);
    }

    #[test]
    fn test_arg_max_picks_highest() {
        let result = ResultShape::ArgMax.apply(emotion_scores()).unwrap();
        assert_eq!(
            result,
            ClassificationResult::Best(BestLabel {
                label: "joy".to_string(),
                confidence: 0.9124,
            })
        );
    }

    #[test]
    fn test_arg_max_tie_keeps_first() {
        let scores = vec![LabelScore::new("positive", 0.5), LabelScore::new("negative", 0.5)];
        let ClassificationResult::Best(best) = ResultShape::ArgMax.apply(scores).unwrap() else {
            panic!("expected best label");
        };
        assert_eq!(best.label, "positive");
    }

    #[test]
    fn test_arg_max_empty_is_error() {
        let err = ResultShape::ArgMax.apply(Vec::new()).unwrap_err();
        assert!(matches!(err, ModelError::Inference(_)));
    }

    #[test]
    fn test_result_serialization_shapes() {
        let dist = ResultShape::FullDistribution.apply(emotion_scores()).unwrap();
        let json = serde_json::to_value(&dist).unwrap();
        assert_eq!(json["joy"], 0.9124);

        let best = ResultShape::ArgMax.apply(emotion_scores()).unwrap();
        let json = serde_json::to_value(&best).unwrap();
        assert_eq!(json["label"], "joy");
        assert_eq!(json["confidence"], 0.9124);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round_score(0.999_96), 1.0);
        assert_eq!(round_score(0.0), 0.0);
        assert_eq!(round_to(12.345_6, 2), 12.35);
    }

    #[test]
    fn test_closure_loader() {
        struct Fixed;
        impl SequenceClassifier for Fixed {
            fn predict(&self, _text: &str) -> Result<Vec<LabelScore>, ModelError> {
                Ok(vec![LabelScore::new("neutral", 1.0)])
            }
        }

        let loader = || -> Result<Arc<dyn SequenceClassifier>, ModelError> { Ok(Arc::new(Fixed)) };
        let model = ModelLoader::load(&loader).unwrap();
        assert_eq!(model.predict("x").unwrap()[0].label, "neutral");
    }
}
