//! Lazily loaded classifier service
//!
//! Wraps a [`ModelLoader`] and the model it produces. The model handle is
//! populated once; concurrent first callers wait on the single in-flight load
//! instead of starting their own. A failed load leaves the handle empty so the
//! next caller retries.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use super::{elapsed_ms, ClassificationResult, ModelLoader, ResultShape, SequenceClassifier};
use crate::error::ModelError;

pub struct TextClassifierService {
    name: &'static str,
    model_id: String,
    shape: ResultShape,
    loader: Arc<dyn ModelLoader>,
    model: OnceCell<Arc<dyn SequenceClassifier>>,
}

impl TextClassifierService {
    pub fn new(
        name: &'static str,
        model_id: impl Into<String>,
        shape: ResultShape,
        loader: Arc<dyn ModelLoader>,
    ) -> Self {
        Self {
            name,
            model_id: model_id.into(),
            shape,
            loader,
            model: OnceCell::new(),
        }
    }

    /// Emotion variant: reports the full label distribution.
    pub fn emotion(model_id: impl Into<String>, loader: Arc<dyn ModelLoader>) -> Self {
        Self::new("emotion", model_id, ResultShape::FullDistribution, loader)
    }

    /// Sentiment variant: reports only the best label.
    pub fn sentiment(model_id: impl Into<String>, loader: Arc<dyn ModelLoader>) -> Self {
        Self::new("sentiment", model_id, ResultShape::ArgMax, loader)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Load the model if it is not loaded yet. No-op afterwards.
    pub async fn load(&self) -> Result<(), ModelError> {
        self.model().await.map(|_| ())
    }

    /// Classify `text`, loading the model first if needed.
    ///
    /// Returns the shaped result and the elapsed milliseconds, including any
    /// load triggered by this call.
    pub async fn classify(&self, text: &str) -> Result<(ClassificationResult, f64), ModelError> {
        let start = Instant::now();

        let model = self.model().await?;
        let input = text.to_owned();
        let scores = tokio::task::spawn_blocking(move || model.predict(&input))
            .await
            .map_err(|e| ModelError::Inference(format!("Inference task failed: {}", e)))??;

        let result = self.shape.apply(scores)?;
        let elapsed = elapsed_ms(start);

        debug!(service = self.name, elapsed_ms = elapsed, "Classified text");
        Ok((result, elapsed))
    }

    async fn model(&self) -> Result<Arc<dyn SequenceClassifier>, ModelError> {
        self.model
            .get_or_try_init(|| async {
                info!(service = self.name, model_id = %self.model_id, "Loading model");
                let start = Instant::now();

                let loader = self.loader.clone();
                let model = tokio::task::spawn_blocking(move || loader.load())
                    .await
                    .map_err(|e| ModelError::Load(format!("Model load task failed: {}", e)))?
                    .map_err(|e| {
                        error!(
                            service = self.name,
                            model_id = %self.model_id,
                            error = %e,
                            "Failed to load model"
                        );
                        e
                    })?;

                info!(
                    service = self.name,
                    model_id = %self.model_id,
                    elapsed_ms = elapsed_ms(start),
                    "Model loaded"
                );
                Ok::<_, ModelError>(model)
            })
            .await
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::classifier::LabelScore;

    struct StaticModel(Vec<LabelScore>);

    impl SequenceClassifier for StaticModel {
        fn predict(&self, _text: &str) -> Result<Vec<LabelScore>, ModelError> {
            Ok(self.0.clone())
        }
    }

    struct FailingModel;

    impl SequenceClassifier for FailingModel {
        fn predict(&self, _text: &str) -> Result<Vec<LabelScore>, ModelError> {
            Err(ModelError::Inference("forward pass failed".to_string()))
        }
    }

    struct CountingLoader {
        loads: AtomicUsize,
        fail_first: bool,
    }

    impl CountingLoader {
        fn new(fail_first: bool) -> Arc<Self> {
            Arc::new(Self {
                loads: AtomicUsize::new(0),
                fail_first,
            })
        }
    }

    impl ModelLoader for CountingLoader {
        fn load(&self) -> Result<Arc<dyn SequenceClassifier>, ModelError> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(ModelError::Load("weights unavailable".to_string()));
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Arc::new(StaticModel(vec![
                LabelScore::new("negative", 0.1),
                LabelScore::new("neutral", 0.2),
                LabelScore::new("positive", 0.7),
            ])))
        }
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let loader = CountingLoader::new(false);
        let service = TextClassifierService::sentiment("test/model", loader.clone());

        assert!(!service.is_loaded());
        service.load().await.unwrap();
        service.load().await.unwrap();

        assert!(service.is_loaded());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_calls_share_one_load() {
        let loader = CountingLoader::new(false);
        let service = Arc::new(TextClassifierService::sentiment("test/model", loader.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.classify("hello").await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_classify_self_heals_without_eager_load() {
        let service = TextClassifierService::sentiment("test/model", CountingLoader::new(false));

        let (result, elapsed) = service.classify("markets rallied").await.unwrap();

        assert!(service.is_loaded());
        assert!(elapsed >= 0.0);
        let ClassificationResult::Best(best) = result else {
            panic!("sentiment service must reduce to a single label");
        };
        assert_eq!(best.label, "positive");
        assert_eq!(best.confidence, 0.7);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let loader = CountingLoader::new(true);
        let service = TextClassifierService::emotion("test/model", loader.clone());

        let err = service.load().await.unwrap_err();
        assert_eq!(err, ModelError::Load("weights unavailable".to_string()));
        assert!(!service.is_loaded());

        let (result, _) = service.classify("again").await.unwrap();
        assert!(matches!(result, ClassificationResult::Distribution(ref m) if m.len() == 3));
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_inference_failure_surfaces_as_model_error() {
        let loader = || -> Result<Arc<dyn SequenceClassifier>, ModelError> {
            Ok(Arc::new(FailingModel))
        };
        let service = TextClassifierService::emotion("test/model", Arc::new(loader));

        let err = service.classify("anything").await.unwrap_err();
        assert_eq!(err.to_string(), "forward pass failed");
    }

    #[tokio::test]
    async fn test_repeated_classification_is_stable() {
        let service = TextClassifierService::emotion("test/model", CountingLoader::new(false));

        let (first, _) = service.classify("same text").await.unwrap();
        let (second, _) = service.classify("same text").await.unwrap();
        assert_eq!(first, second);
    }
}
