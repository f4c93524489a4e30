use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::chunking::DEFAULT_MAX_WORDS;

pub const DEFAULT_MODEL_REPO: &str = "j-hartmann/emotion-english-distilroberta-base";
pub const DEFAULT_ONNX_FILE: &str = "onnx/model.onnx";
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// De onde vem o modelo
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    /// Diretório local com model.onnx, tokenizer.json e config.json
    Dir(PathBuf),
    /// Repositório do Hugging Face hub
    Hub { repo: String, onnx_file: String },
}

impl ModelSource {
    pub fn describe(&self) -> String {
        match self {
            ModelSource::Dir(dir) => dir.display().to_string(),
            ModelSource::Hub { repo, .. } => repo.clone(),
        }
    }
}

/// Configuração do serviço (variáveis de ambiente EMOCAO_*)
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: IpAddr,
    pub port: u16,
    pub max_words: usize,
    pub max_tokens: usize,
    pub model: ModelSource,
    pub cache_dir: PathBuf,
    pub threads: Option<usize>,
    pub body_limit: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Monta a configuração a partir de uma função de lookup (facilita testes)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = parse_or(&get, "EMOCAO_HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port = parse_or(&get, "EMOCAO_PORT", 8000u16)?;
        let max_words = parse_or(&get, "EMOCAO_MAX_WORDS", DEFAULT_MAX_WORDS)?;
        let max_tokens = parse_or(&get, "EMOCAO_MAX_TOKENS", 512usize)?;
        let body_limit = parse_or(&get, "EMOCAO_BODY_LIMIT", DEFAULT_BODY_LIMIT)?;
        let threads = match get("EMOCAO_THREADS") {
            Some(v) => Some(parse_value::<usize>("EMOCAO_THREADS", &v)?),
            None => None,
        };

        if max_words == 0 {
            bail!("EMOCAO_MAX_WORDS deve ser maior que zero");
        }
        if max_tokens == 0 {
            bail!("EMOCAO_MAX_TOKENS deve ser maior que zero");
        }
        if threads == Some(0) {
            bail!("EMOCAO_THREADS deve ser maior que zero");
        }

        let model = match get("EMOCAO_MODEL_DIR") {
            Some(dir) => ModelSource::Dir(PathBuf::from(dir)),
            None => ModelSource::Hub {
                repo: get("EMOCAO_MODEL_REPO").unwrap_or_else(|| DEFAULT_MODEL_REPO.to_string()),
                onnx_file: get("EMOCAO_ONNX_FILE").unwrap_or_else(|| DEFAULT_ONNX_FILE.to_string()),
            },
        };

        let cache_dir = match get("EMOCAO_CACHE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_cache_dir()?,
        };

        Ok(Self {
            host,
            port,
            max_words,
            max_tokens,
            model,
            cache_dir,
            threads,
            body_limit,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn default_cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .context("diretório de cache não encontrado (defina EMOCAO_CACHE_DIR)")?;
    Ok(base.join("analisador-emocoes").join("models"))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("valor inválido para {}: {:?}", key, raw))
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}
