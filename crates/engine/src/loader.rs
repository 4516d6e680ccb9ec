//! Engine loader: builds the configured backend.
//!
//! Selects the engine from `AppConfig::engine.backend` and performs whatever
//! warm-up the backend needs before it can serve requests: probing the remote
//! server, or downloading and mapping local weights.

use std::sync::Arc;
use std::time::Duration;

use chatline_config::{AppConfig, EngineBackend};
use chatline_core::engine::GenerationEngine;
use chatline_core::error::EngineError;
use tracing::info;

use crate::remote::RemoteEngine;

/// Build and warm up the engine described by `config`.
pub async fn load_engine(config: &AppConfig) -> Result<Arc<dyn GenerationEngine>, EngineError> {
    match config.engine.backend {
        EngineBackend::Remote => {
            let engine = RemoteEngine::new(
                &config.engine.endpoint,
                Duration::from_secs(config.engine.request_timeout_secs),
            )?;
            engine.probe().await?;
            info!(endpoint = %engine.base_url(), "Remote generation server reachable");
            Ok(Arc::new(engine))
        }
        EngineBackend::Local => load_local(&config.engine.model).await,
    }
}

#[cfg(feature = "local")]
async fn load_local(model: &str) -> Result<Arc<dyn GenerationEngine>, EngineError> {
    let model = model.to_string();
    let engine = tokio::task::spawn_blocking(move || crate::local::LocalEngine::load(&model))
        .await
        .map_err(|e| EngineError::Unavailable(format!("Model loading task failed: {e}")))??;
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "local"))]
async fn load_local(model: &str) -> Result<Arc<dyn GenerationEngine>, EngineError> {
    Err(EngineError::Unavailable(format!(
        "cannot load '{model}': this build has no local inference support \
         (rebuild with `--features local`)"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "local"))]
    #[tokio::test]
    async fn local_backend_without_feature_is_unavailable() {
        let mut config = AppConfig::default();
        config.engine.backend = EngineBackend::Local;
        let err = load_engine(&config).await.err().unwrap();
        assert!(err.to_string().contains("--features local"));
    }

    #[tokio::test]
    async fn remote_backend_probes_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = AppConfig::default();
        config.engine.endpoint = format!("http://{addr}");
        config.engine.request_timeout_secs = 2;

        let err = load_engine(&config).await.err().unwrap();
        assert!(matches!(err, EngineError::Network(_)));
    }
}
