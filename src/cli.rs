/// Análise de emoções offline: lê texto de stdin e imprime o resultado em JSON.
///
/// Usa o mesmo chunking, classificador e agregação do servidor HTTP, com a
/// mesma configuração (variáveis EMOCAO_*). Logs vão para stderr.
///
///   echo "I am so happy today" | analisar-emocao
use std::io::Read;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

mod aggregate;
mod chunking;
mod classifier;
mod config;
mod emotions;

use aggregate::EmotionReport;
use classifier::OnnxEmotionClassifier;
use config::Settings;

#[derive(Serialize)]
struct Output {
    resultado: EmotionReport,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("falha ao ler stdin")?;

    let settings = Settings::from_env()?;
    let classifier = OnnxEmotionClassifier::load(&settings)?;

    let resultado = aggregate::analyze(&input, settings.max_words, &classifier)?;
    info!("Análise concluída");

    let json = serde_json::to_string_pretty(&Output { resultado })?;
    println!("{}", json);
    Ok(())
}
