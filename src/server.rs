use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::aggregate::{analyze, EmotionReport};
use crate::classifier::EmotionClassifier;

// ---- Request / Response ----

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub texto: String,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub resultado: EmotionReport,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub modelo: String,
    pub versao: &'static str,
    pub iniciado_em: DateTime<Utc>,
}

// ---- State ----

#[derive(Clone)]
pub struct AppState {
    classifier: Arc<dyn EmotionClassifier>,
    max_words: usize,
    model_name: Arc<str>,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(classifier: Arc<dyn EmotionClassifier>, max_words: usize, model_name: impl Into<Arc<str>>) -> Self {
        Self {
            classifier,
            max_words,
            model_name: model_name.into(),
            started_at: Utc::now(),
        }
    }
}

// ---- Errors ----

#[derive(Debug)]
pub enum ApiError {
    /// Corpo da requisição rejeitado (JSON inválido, campo ausente ou de tipo errado)
    Rejected(StatusCode, String),
    Internal(anyhow::Error),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Rejected(status, detail) => (status, detail),
            ApiError::Internal(err) => {
                error!("Erro interno: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

// ---- Handlers ----

/// POST /analisar-emocao/
async fn analisar_emocao(
    State(state): State<AppState>,
    payload: Result<Json<TextRequest>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let Json(request) = payload?;
    let classifier = state.classifier.clone();
    let max_words = state.max_words;

    // Inferência é CPU-bound: roda em blocking thread
    let resultado = tokio::task::spawn_blocking(move || {
        analyze(&request.texto, max_words, classifier.as_ref())
    })
    .await
    .map_err(|e| anyhow::anyhow!("tarefa de análise abortada: {}", e))??;

    Ok(Json(AnalysisResponse { resultado }))
}

/// GET /saude
async fn saude(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        modelo: state.model_name.to_string(),
        versao: env!("CARGO_PKG_VERSION"),
        iniciado_em: state.started_at,
    })
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/analisar-emocao/", post(analisar_emocao))
        .route("/saude", get(saude))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Aguarda Ctrl-C ou SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Falha ao escutar Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Falha ao escutar SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Sinal de parada recebido, encerrando...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::LabelScore;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    /// Devolve sempre as mesmas pontuações
    struct FixedClassifier(Vec<(&'static str, f32)>);

    impl EmotionClassifier for FixedClassifier {
        fn classify(&self, _text: &str) -> anyhow::Result<Vec<LabelScore>> {
            Ok(self.0.iter().map(|(l, s)| LabelScore::new(*l, *s)).collect())
        }
    }

    struct BrokenClassifier;

    impl EmotionClassifier for BrokenClassifier {
        fn classify(&self, _text: &str) -> anyhow::Result<Vec<LabelScore>> {
            anyhow::bail!("sessão ONNX falhou")
        }
    }

    fn app(classifier: impl EmotionClassifier + 'static) -> Router {
        let state = AppState::new(Arc::new(classifier), 512, "modelo-de-teste");
        router(state, 1024 * 1024)
    }

    fn happy() -> FixedClassifier {
        FixedClassifier(vec![("joy", 0.9), ("sadness", 0.05), ("neutral", 0.05)])
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/analisar-emocao/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_analisar_emocao_ok() {
        let response = app(happy())
            .oneshot(post_json(r#"{"texto": "I am so happy today"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            read_json(response).await,
            serde_json::json!({
                "resultado": {
                    "alegria": "90.00%",
                    "tristeza": "5.00%",
                    "neutro": "5.00%",
                    "raiva": "0.00%",
                    "desgosto": "0.00%",
                    "medo": "0.00%",
                    "surpresa": "0.00%"
                }
            })
        );
    }

    #[tokio::test]
    async fn test_empty_text_returns_zero_percent() {
        let response = app(happy()).oneshot(post_json(r#"{"texto": ""}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        let resultado = json["resultado"].as_object().unwrap();
        assert_eq!(resultado.len(), 7);
        assert!(resultado.values().all(|v| v == "0%"));
    }

    #[tokio::test]
    async fn test_missing_field_is_client_error() {
        let response = app(happy()).oneshot(post_json(r#"{"text": "oi"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = read_json(response).await;
        assert!(json["detail"].as_str().unwrap().contains("texto"));
    }

    #[tokio::test]
    async fn test_wrong_type_is_client_error() {
        let response = app(happy()).oneshot(post_json(r#"{"texto": 42}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let response = app(happy()).oneshot(post_json(r#"{"texto": "#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_content_type() {
        let request = Request::builder()
            .method("POST")
            .uri("/analisar-emocao/")
            .body(Body::from(r#"{"texto": "oi"}"#))
            .unwrap();
        let response = app(happy()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_classifier_failure_is_internal_error() {
        let response = app(BrokenClassifier)
            .oneshot(post_json(r#"{"texto": "qualquer coisa"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            read_json(response).await,
            serde_json::json!({ "detail": "Internal Server Error" })
        );
    }

    #[tokio::test]
    async fn test_saude() {
        let request = Request::builder().uri("/saude").body(Body::empty()).unwrap();
        let response = app(happy()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["modelo"], "modelo-de-teste");
        assert_eq!(json["versao"], env!("CARGO_PKG_VERSION"));
        assert!(json["iniciado_em"].is_string());
    }

    #[tokio::test]
    async fn test_get_on_analysis_route_not_allowed() {
        let request = Request::builder()
            .uri("/analisar-emocao/")
            .body(Body::empty())
            .unwrap();
        let response = app(happy()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
