//! Candle-based sequence classifier
//!
//! Loads BERT or RoBERTa sequence-classification checkpoints, either from the
//! HuggingFace hub or from a local directory holding `config.json`,
//! `tokenizer.json` and the weights.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::{DType, Device, IndexOp, Module, Tensor};
use candle_nn::{Linear, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::{Tokenizer, TruncationDirection, TruncationParams, TruncationStrategy};
use tracing::{debug, info};

use super::{LabelScore, ModelLoader, SequenceClassifier};
use crate::error::ModelError;

pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 512;

/// Smallest accepted max sequence length; leaves room beside the special tokens.
pub const MIN_SEQUENCE_LENGTH: usize = 8;

const WEIGHT_FILES: [&str; 2] = ["model.safetensors", "pytorch_model.bin"];

/// Encoder family, read from `model_type` in `config.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Architecture {
    Bert,
    Roberta,
}

impl Architecture {
    fn from_config(config: &serde_json::Value) -> Self {
        match config["model_type"].as_str() {
            Some("roberta") => Architecture::Roberta,
            _ => Architecture::Bert,
        }
    }
}

struct ModelFiles {
    config: PathBuf,
    tokenizer: PathBuf,
    weights: PathBuf,
}

impl ModelFiles {
    fn resolve(model_id: &str) -> Result<Self, ModelError> {
        let local = Path::new(model_id);
        if local.is_dir() {
            return Self::from_dir(local);
        }

        let api = Api::new()?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config = repo.get("config.json")?;
        let tokenizer = repo.get("tokenizer.json")?;
        let weights = match repo.get(WEIGHT_FILES[0]) {
            Ok(path) => path,
            Err(e) => {
                debug!(model_id, error = %e, "No safetensors weights, trying pytorch_model.bin");
                repo.get(WEIGHT_FILES[1])?
            }
        };

        Ok(Self {
            config,
            tokenizer,
            weights,
        })
    }

    fn from_dir(dir: &Path) -> Result<Self, ModelError> {
        let weights = WEIGHT_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
            .ok_or_else(|| {
                ModelError::Load(format!("No model weights found in {}", dir.display()))
            })?;

        Ok(Self {
            config: dir.join("config.json"),
            tokenizer: dir.join("tokenizer.json"),
            weights,
        })
    }

    fn is_pytorch(&self) -> bool {
        self.weights.extension().and_then(|s| s.to_str()) == Some("bin")
    }
}

/// Transformer body. RoBERTa goes through candle's XLM-RoBERTa encoder, whose
/// position ids start after `pad_token_id` the way the checkpoints were trained.
enum Encoder {
    Bert(BertModel),
    Roberta(XLMRobertaModel),
}

impl Encoder {
    /// `[1, seq_len]` ids and mask in, `[1, seq_len, hidden]` states out.
    fn forward(&self, token_ids: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
        let token_type_ids = token_ids.zeros_like()?;
        match self {
            Encoder::Bert(model) => model.forward(token_ids, &token_type_ids, Some(attention_mask)),
            Encoder::Roberta(model) => {
                model.forward(token_ids, attention_mask, &token_type_ids, None, None, None)
            }
        }
    }
}

/// Encoder weights plus the first-token classification head.
struct ClassificationModel {
    encoder: Encoder,
    pre_classifier: Linear,
    classifier: Linear,
}

impl ClassificationModel {
    fn load(
        architecture: Architecture,
        raw_config: &serde_json::Value,
        num_labels: usize,
        vb: VarBuilder,
    ) -> Result<Self, ModelError> {
        match architecture {
            Architecture::Roberta => {
                let config = roberta_config(raw_config)?;
                let hidden = config.hidden_size;
                Ok(Self {
                    encoder: Encoder::Roberta(XLMRobertaModel::new(&config, vb.pp("roberta"))?),
                    pre_classifier: candle_nn::linear(hidden, hidden, vb.pp("classifier").pp("dense"))?,
                    classifier: candle_nn::linear(hidden, num_labels, vb.pp("classifier").pp("out_proj"))?,
                })
            }
            Architecture::Bert => {
                let config: BertConfig = serde_json::from_value(raw_config.clone())?;
                let hidden = config.hidden_size;
                Ok(Self {
                    encoder: Encoder::Bert(BertModel::load(vb.pp("bert"), &config)?),
                    pre_classifier: candle_nn::linear(hidden, hidden, vb.pp("bert").pp("pooler").pp("dense"))?,
                    classifier: candle_nn::linear(hidden, num_labels, vb.pp("classifier"))?,
                })
            }
        }
    }

    /// First token (<s> / [CLS]) -> dense -> tanh -> logits, shape `[1, num_labels]`.
    fn logits(&self, token_ids: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
        let sequence_output = self.encoder.forward(token_ids, attention_mask)?;
        let first_token = sequence_output.i((.., 0))?;
        let pooled = self.pre_classifier.forward(&first_token)?.tanh()?;
        self.classifier.forward(&pooled)
    }
}

/// RoBERTa `config.json` as candle's XLM-RoBERTa config. Older checkpoints
/// omit `position_embedding_type`.
fn roberta_config(raw_config: &serde_json::Value) -> Result<XLMRobertaConfig, ModelError> {
    let mut raw_config = raw_config.clone();
    if let Some(fields) = raw_config.as_object_mut() {
        fields
            .entry("position_embedding_type")
            .or_insert_with(|| serde_json::Value::from("absolute"));
    }
    Ok(serde_json::from_value(raw_config)?)
}

/// Encoder plus a sequence-classification head, softmax over the logits.
pub struct CandleSequenceClassifier {
    model: ClassificationModel,
    tokenizer: Tokenizer,
    labels: Vec<String>,
    device: Device,
}

impl CandleSequenceClassifier {
    /// Load from a HuggingFace repo id or a local model directory.
    pub fn from_pretrained(model_id: &str, max_sequence_length: usize) -> Result<Self, ModelError> {
        info!(model_id, "Loading Candle classifier");
        let files = ModelFiles::resolve(model_id)?;

        debug!("Config: {:?}", files.config);
        debug!("Weights: {:?}", files.weights);
        debug!("Tokenizer: {:?}", files.tokenizer);

        let device = Device::Cpu;

        let raw_config: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&files.config)?)?;
        let labels = labels_from_config(&raw_config)?;
        let architecture = Architecture::from_config(&raw_config);

        let vb = if files.is_pytorch() {
            VarBuilder::from_pth(&files.weights, DType::F32, &device)?
        } else {
            // The weights file stays untouched for the life of the mapping.
            unsafe { VarBuilder::from_mmaped_safetensors(&[&files.weights], DType::F32, &device)? }
        };

        let model = ClassificationModel::load(architecture, &raw_config, labels.len(), vb)?;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| ModelError::Load(format!("Failed to load tokenizer: {}", e)))?;
        let special_tokens = tokenizer
            .encode("", true)
            .map_err(|e| ModelError::Load(format!("Failed to count special tokens: {}", e)))?
            .len();
        if max_sequence_length <= special_tokens {
            return Err(ModelError::Load(format!(
                "Max sequence length {} leaves no room beside {} special tokens",
                max_sequence_length, special_tokens
            )));
        }
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_sequence_length,
                strategy: TruncationStrategy::LongestFirst,
                stride: 0,
                direction: TruncationDirection::Right,
            }))
            .map_err(|e| ModelError::Load(format!("Invalid truncation settings: {}", e)))?;

        info!(
            model_id,
            architecture = ?architecture,
            labels = labels.len(),
            max_sequence_length,
            "Initialized Candle classifier"
        );

        Ok(Self {
            model,
            tokenizer,
            labels,
            device,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl SequenceClassifier for CandleSequenceClassifier {
    fn predict(&self, text: &str) -> Result<Vec<LabelScore>, ModelError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ModelError::Tokenization(format!("Tokenization failed: {}", e)))?;

        let token_ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(encoding.get_attention_mask(), &self.device)?.unsqueeze(0)?;

        let logits = self.model.logits(&token_ids, &attention_mask)?;
        let probabilities = candle_nn::ops::softmax(&logits, 1)?
            .squeeze(0)?
            .to_vec1::<f32>()?;

        if probabilities.len() != self.labels.len() {
            return Err(ModelError::Inference(format!(
                "Label count mismatch: {} labels but {} probabilities",
                self.labels.len(),
                probabilities.len()
            )));
        }

        Ok(self
            .labels
            .iter()
            .zip(probabilities)
            .map(|(label, score)| LabelScore::new(label.clone(), score))
            .collect())
    }
}

/// Labels ordered by class index from `id2label`.
fn labels_from_config(config: &serde_json::Value) -> Result<Vec<String>, ModelError> {
    let id2label = config
        .get("id2label")
        .and_then(|v| v.as_object())
        .ok_or_else(|| ModelError::Load("config.json has no id2label mapping".to_string()))?;

    let mut pairs = id2label
        .iter()
        .map(|(idx, label)| {
            let idx = idx
                .parse::<usize>()
                .map_err(|_| ModelError::Load(format!("Invalid id2label index: {}", idx)))?;
            let label = label
                .as_str()
                .ok_or_else(|| ModelError::Load(format!("id2label[{}] is not a string", idx)))?;
            Ok((idx, label.to_string()))
        })
        .collect::<Result<Vec<_>, ModelError>>()?;

    if pairs.is_empty() {
        return Err(ModelError::Load("config.json id2label is empty".to_string()));
    }

    pairs.sort_by_key(|(idx, _)| *idx);
    Ok(pairs.into_iter().map(|(_, label)| label).collect())
}

/// [`ModelLoader`] building a [`CandleSequenceClassifier`].
#[derive(Debug, Clone)]
pub struct CandleLoader {
    model_id: String,
    max_sequence_length: usize,
}

impl CandleLoader {
    pub fn new(model_id: impl Into<String>, max_sequence_length: usize) -> Self {
        Self {
            model_id: model_id.into(),
            max_sequence_length,
        }
    }
}

impl ModelLoader for CandleLoader {
    fn load(&self) -> Result<Arc<dyn SequenceClassifier>, ModelError> {
        let model = CandleSequenceClassifier::from_pretrained(&self.model_id, self.max_sequence_length)?;
        Ok(Arc::new(model))
    }
}
