//! In-process sentence embedding with a BERT-family model
//!
//! Loads `config.json`, `tokenizer.json` and `model.safetensors` (the
//! all-MiniLM-L6-v2 layout) either from a local directory or from the
//! Hugging Face hub cache, then embeds with masked mean pooling and L2
//! normalization.

use crate::embedding::EmbeddingClient;
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use folio_core::config::EmbeddingConfig;
use folio_core::{FolioError, Result};
use hf_hub::api::tokio::{ApiBuilder, ApiRepo};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// BERT `[PAD]` token id
const PAD_ID: u32 = 0;

fn model_error(context: &str, e: impl std::fmt::Display) -> FolioError {
    FolioError::Embedding(format!("{context}: {e}"))
}

async fn fetch(handle: &ApiRepo, repo: &str, file: &str) -> Result<PathBuf> {
    handle
        .get(file)
        .await
        .map_err(|e| model_error(&format!("Failed to download {file} from {repo}"), e))
}

/// Hidden size as declared by the model config
#[derive(Deserialize)]
struct ModelDims {
    hidden_size: usize,
}

/// Locations of the three model files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    /// Files inside one directory
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config: dir.join(CONFIG_FILE),
            tokenizer: dir.join(TOKENIZER_FILE),
            weights: dir.join(WEIGHTS_FILE),
        }
    }

    fn missing(&self) -> Option<&Path> {
        [&self.config, &self.tokenizer, &self.weights]
            .into_iter()
            .find(|p| !p.is_file())
            .map(PathBuf::as_path)
    }

    /// Fetch `repo` from the hub, reusing files already under `cache_dir`
    pub async fn download(repo: &str, cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)?;
        let api = ApiBuilder::new()
            .with_cache_dir(cache_dir.to_path_buf())
            .build()
            .map_err(|e| model_error("Failed to create Hugging Face client", e))?;
        let handle = api.model(repo.to_string());

        Ok(Self {
            config: fetch(&handle, repo, CONFIG_FILE).await?,
            tokenizer: fetch(&handle, repo, TOKENIZER_FILE).await?,
            weights: fetch(&handle, repo, WEIGHTS_FILE).await?,
        })
    }

    /// `model_dir` when configured, otherwise the hub copy of `local_model`
    pub async fn resolve(config: &EmbeddingConfig) -> Result<Self> {
        match &config.model_dir {
            Some(dir) => {
                let files = Self::in_dir(dir);
                if let Some(missing) = files.missing() {
                    return Err(FolioError::Config(format!(
                        "Embedding model file not found: {}",
                        missing.display()
                    )));
                }
                Ok(files)
            }
            None => {
                tracing::info!(
                    "Fetching embedding model {} into {}",
                    config.local_model,
                    config.model_cache_dir.display()
                );
                Self::download(&config.local_model, &config.model_cache_dir).await
            }
        }
    }
}

/// Sentence embedder running a BERT encoder on the CPU
pub struct MiniLmEmbedding {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
    max_len: usize,
}

impl MiniLmEmbedding {
    pub fn load(files: &ModelFiles, max_len: usize) -> Result<Self> {
        let device = Device::Cpu;

        let raw_config = std::fs::read_to_string(&files.config)?;
        let config: BertConfig = serde_json::from_str(&raw_config)?;
        let dims: ModelDims = serde_json::from_str(&raw_config)?;
        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| model_error("Failed to load tokenizer", e))?;
        let weights = candle_core::safetensors::load(&files.weights, &device)
            .map_err(|e| model_error("Failed to load model weights", e))?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model =
            BertModel::load(vb, &config).map_err(|e| model_error("Failed to build model", e))?;

        tracing::info!(
            "Loaded embedding model from {} ({} dims)",
            files.weights.display(),
            dims.hidden_size
        );
        Ok(Self {
            model,
            tokenizer,
            device,
            dimension: dims.hidden_size,
            max_len: max_len.max(2),
        })
    }

    /// Padded `(input_ids, attention_mask)` rows for a batch
    fn encode(&self, texts: &[&str]) -> Result<(Tensor, Tensor)> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| model_error("Tokenization failed", e))?;

        let width = encodings
            .iter()
            .map(|e| e.get_ids().len().min(self.max_len))
            .max()
            .unwrap_or(0)
            .max(1);

        let mut ids = Vec::with_capacity(texts.len() * width);
        let mut mask = Vec::with_capacity(texts.len() * width);
        for encoding in &encodings {
            let len = encoding.get_ids().len().min(width);
            ids.extend_from_slice(&encoding.get_ids()[..len]);
            mask.extend_from_slice(&encoding.get_attention_mask()[..len]);
            ids.extend(std::iter::repeat(PAD_ID).take(width - len));
            mask.extend(std::iter::repeat(0).take(width - len));
        }

        let shape = (texts.len(), width);
        let input_ids = Tensor::from_vec(ids, shape, &self.device)
            .map_err(|e| model_error("Failed to build input tensor", e))?;
        let attention_mask = Tensor::from_vec(mask, shape, &self.device)
            .map_err(|e| model_error("Failed to build mask tensor", e))?;
        Ok((input_ids, attention_mask))
    }

    /// Embed a batch synchronously; embedding never yields mid-batch
    pub fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let (input_ids, attention_mask) = self.encode(texts)?;
        let forward = || -> candle_core::Result<Vec<Vec<f32>>> {
            let token_type_ids = input_ids.zeros_like()?;
            let hidden = self
                .model
                .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
            masked_mean_l2(&hidden, &attention_mask)?.to_vec2::<f32>()
        };
        forward().map_err(|e| model_error("Embedding forward pass failed", e))
    }
}

/// Mean of the unmasked token states, scaled to unit length
fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask = attention_mask.to_dtype(hidden.dtype())?.unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?.affine(1.0, 1e-9)?;
    let mean = summed.broadcast_div(&counts)?;
    let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?.affine(1.0, 1e-12)?;
    mean.broadcast_div(&norm)
}

#[async_trait]
impl EmbeddingClient for MiniLmEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_texts(&[text])?
            .pop()
            .ok_or_else(|| FolioError::Embedding("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let borrowed: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.embed_texts(&borrowed)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
