mod aggregate;
mod chunking;
mod classifier;
mod config;
mod emotions;
mod server;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use classifier::{EmotionClassifier, OnnxEmotionClassifier};
use config::Settings;
use server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("Analisador de Emoções Starting...");

    let settings = Settings::from_env()?;
    info!("Modelo: {}", settings.model.describe());
    info!("Chunking: {} palavras por chunk, {} tokens por inferência", settings.max_words, settings.max_tokens);

    // Carrega o classificador uma única vez (compartilhado entre requisições).
    // Download do hub e init do ONNX Runtime são bloqueantes.
    let classifier: Arc<dyn EmotionClassifier> = {
        let settings = settings.clone();
        let engine = tokio::task::spawn_blocking(move || OnnxEmotionClassifier::load(&settings))
            .await
            .context("carregamento do modelo abortado")??;
        Arc::new(engine)
    };

    let state = AppState::new(classifier, settings.max_words, settings.model.describe());
    let app = server::router(state, settings.body_limit);

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("falha ao escutar em {}", addr))?;
    info!("Servidor HTTP rodando em http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await
        .inspect_err(|e| tracing::error!("Erro no servidor: {:?}", e))?;

    info!("Servidor encerrado");
    Ok(())
}
