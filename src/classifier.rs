use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use hf_hub::api::sync::ApiBuilder;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use serde::Deserialize;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::info;

use crate::config::{ModelSource, Settings};

/// Pontuação de um label para um chunk
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self { label: label.into(), score }
    }
}

/// Classificador de emoções multi-label. Uma instância é carregada no startup
/// e compartilhada (somente leitura) por todas as requisições.
pub trait EmotionClassifier: Send + Sync {
    /// Pontua um chunk; devolve um par (label, score) por label do modelo.
    fn classify(&self, text: &str) -> Result<Vec<LabelScore>>;
}

#[derive(Debug, Deserialize)]
struct ModelConfig {
    id2label: HashMap<String, String>,
    #[serde(default)]
    problem_type: Option<String>,
}

/// Como transformar logits em scores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreFunction {
    Softmax,
    Sigmoid,
}

impl ScoreFunction {
    fn for_problem_type(problem_type: Option<&str>) -> Self {
        match problem_type {
            Some("multi_label_classification") => ScoreFunction::Sigmoid,
            _ => ScoreFunction::Softmax,
        }
    }

    pub fn apply(self, logits: &[f32]) -> Vec<f32> {
        match self {
            ScoreFunction::Softmax => softmax(logits),
            ScoreFunction::Sigmoid => logits.iter().map(|&x| 1.0 / (1.0 + (-x).exp())).collect(),
        }
    }
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|x| x / sum).collect()
}

/// Converte o `id2label` do config.json num vetor indexado pelo id da classe
fn label_table(id2label: HashMap<String, String>) -> Result<Vec<String>> {
    let mut labels = vec![String::new(); id2label.len()];
    for (id, label) in id2label {
        let idx: usize = id
            .parse()
            .with_context(|| format!("id de label inválido no config.json: {}", id))?;
        if idx >= labels.len() {
            bail!("id de label {} fora do intervalo (total {})", idx, labels.len());
        }
        labels[idx] = label;
    }
    Ok(labels)
}

/// Arquivos necessários para montar o classificador
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub model: PathBuf,
    pub tokenizer: PathBuf,
    pub config: PathBuf,
}

impl ModelFiles {
    /// Diretório local: aceita `model.onnx` na raiz ou em `onnx/`
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let model = [dir.join("model.onnx"), dir.join("onnx").join("model.onnx")]
            .into_iter()
            .find(|p| p.exists())
            .ok_or_else(|| anyhow!("model.onnx não encontrado em {}", dir.display()))?;
        let files = Self {
            model,
            tokenizer: dir.join("tokenizer.json"),
            config: dir.join("config.json"),
        };
        for path in [&files.tokenizer, &files.config] {
            if !path.exists() {
                bail!("{} não encontrado", path.display());
            }
        }
        Ok(files)
    }

    /// Baixa (ou reaproveita do cache) os arquivos do Hugging Face hub
    pub fn from_hub(repo: &str, onnx_file: &str, cache_dir: &Path) -> Result<Self> {
        info!("Resolvendo modelo {} (cache em {})", repo, cache_dir.display());
        let api = ApiBuilder::new()
            .with_cache_dir(cache_dir.to_path_buf())
            .with_progress(false)
            .build()
            .context("falha ao criar cliente do Hugging Face hub")?;
        let repo_api = api.model(repo.to_string());
        let get = |name: &str| {
            repo_api
                .get(name)
                .with_context(|| format!("falha ao baixar {} de {}", name, repo))
        };
        Ok(Self {
            model: get(onnx_file)?,
            tokenizer: get("tokenizer.json")?,
            config: get("config.json")?,
        })
    }

    pub fn resolve(settings: &Settings) -> Result<Self> {
        match &settings.model {
            ModelSource::Dir(dir) => Self::from_dir(dir),
            ModelSource::Hub { repo, onnx_file } => {
                Self::from_hub(repo, onnx_file, &settings.cache_dir)
            }
        }
    }
}

/// Classificador ONNX (thread-safe via Mutex na sessão)
pub struct OnnxEmotionClassifier {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    labels: Vec<String>,
    score_fn: ScoreFunction,
    needs_token_type_ids: bool,
}

impl OnnxEmotionClassifier {
    pub fn load(settings: &Settings) -> Result<Self> {
        let files = ModelFiles::resolve(settings)?;
        Self::from_files(&files, settings.max_tokens, settings.threads)
    }

    pub fn from_files(files: &ModelFiles, max_tokens: usize, threads: Option<usize>) -> Result<Self> {
        info!("Carregando classificador de emoções ({})...", files.model.display());

        let raw = std::fs::read_to_string(&files.config)
            .with_context(|| format!("falha ao ler {}", files.config.display()))?;
        let config: ModelConfig = serde_json::from_str(&raw)
            .with_context(|| format!("config.json inválido: {}", files.config.display()))?;
        let score_fn = ScoreFunction::for_problem_type(config.problem_type.as_deref());
        let labels = label_table(config.id2label)?;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow!("falha ao carregar tokenizer {}: {}", files.tokenizer.display(), e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_tokens,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("truncation: {}", e))?;
        tokenizer.with_padding(None);

        let mut builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
        if let Some(n) = threads {
            builder = builder.with_intra_threads(n)?;
        }
        let session = builder
            .commit_from_file(&files.model)
            .with_context(|| format!("falha ao carregar {}", files.model.display()))?;
        let needs_token_type_ids = session.inputs.iter().any(|i| i.name == "token_type_ids");

        info!(
            "Classificador carregado: {} labels {:?}, score={:?}",
            labels.len(),
            labels,
            score_fn
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            labels,
            score_fn,
            needs_token_type_ids,
        })
    }
}

impl EmotionClassifier for OnnxEmotionClassifier {
    fn classify(&self, text: &str) -> Result<Vec<LabelScore>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("tokenização falhou: {}", e))?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let mask: Vec<i64> = encoding.get_attention_mask().iter().map(|&m| m as i64).collect();
        let len = ids.len();

        let mut inputs = ort::inputs![
            "input_ids" => Tensor::from_array(([1usize, len], ids))?,
            "attention_mask" => Tensor::from_array(([1usize, len], mask))?,
        ];
        if self.needs_token_type_ids {
            let type_ids = Tensor::from_array(([1usize, len], vec![0i64; len]))?;
            inputs.push(("token_type_ids".into(), type_ids.into()));
        }

        let logits: Vec<f32> = {
            let mut session = self.session.lock().map_err(|e| anyhow!("lock: {}", e))?;
            let outputs = session.run(inputs)?;
            let (_, data) = outputs[0].try_extract_tensor::<f32>()?;
            data.to_vec()
        };

        if logits.len() != self.labels.len() {
            bail!(
                "modelo devolveu {} logits, esperado {}",
                logits.len(),
                self.labels.len()
            );
        }

        Ok(self
            .labels
            .iter()
            .zip(self.score_fn.apply(&logits))
            .map(|(label, score)| LabelScore::new(label.clone(), score))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[2.0, 1.0, 0.1, -3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs[0] > probs[1] && probs[1] > probs[2] && probs[2] > probs[3]);
    }

    #[test]
    fn test_softmax_large_logits_stable() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);
        assert!((probs[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_score_function_for_problem_type() {
        assert_eq!(ScoreFunction::for_problem_type(None), ScoreFunction::Softmax);
        assert_eq!(
            ScoreFunction::for_problem_type(Some("single_label_classification")),
            ScoreFunction::Softmax
        );
        assert_eq!(
            ScoreFunction::for_problem_type(Some("multi_label_classification")),
            ScoreFunction::Sigmoid
        );
    }

    #[test]
    fn test_sigmoid() {
        let scores = ScoreFunction::Sigmoid.apply(&[0.0, 100.0, -100.0]);
        assert!((scores[0] - 0.5).abs() < 1e-6);
        assert!(scores[1] > 0.999);
        assert!(scores[2] < 0.001);
    }

    #[test]
    fn test_label_table_orders_by_id() {
        let id2label: HashMap<String, String> = [("1", "disgust"), ("0", "anger"), ("2", "fear")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(label_table(id2label).unwrap(), vec!["anger", "disgust", "fear"]);
    }

    #[test]
    fn test_label_table_rejects_bad_ids() {
        let gap: HashMap<String, String> = [("0".to_string(), "a".to_string()), ("5".to_string(), "b".to_string())]
            .into_iter()
            .collect();
        assert!(label_table(gap).is_err());

        let junk: HashMap<String, String> = [("x".to_string(), "a".to_string())].into_iter().collect();
        assert!(label_table(junk).is_err());
    }

    #[test]
    fn test_model_config_parses_hf_config() {
        let raw = r#"{
            "architectures": ["RobertaForSequenceClassification"],
            "id2label": {"0": "anger", "1": "disgust"},
            "problem_type": "single_label_classification"
        }"#;
        let config: ModelConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.id2label.len(), 2);
        assert_eq!(config.problem_type.as_deref(), Some("single_label_classification"));
    }

    #[test]
    fn test_model_files_missing_dir() {
        let dir = std::env::temp_dir().join("analisador-emocoes-inexistente");
        assert!(ModelFiles::from_dir(&dir).is_err());
    }
}
