use handmat_core::{BackendDescriptor, CapabilityClass, PredictionSet, Recognizer};
use image::RgbImage;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Queued requests per engine before senders wait.
const QUEUE_DEPTH: usize = 16;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from request handlers to an engine thread.
enum EngineRequest {
    Predict {
        image: RgbImage,
        reply: oneshot::Sender<PredictionSet>,
    },
}

/// Clone-safe handle to one capability's engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    descriptor: BackendDescriptor,
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    pub fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    /// Run one prediction on the engine thread.
    pub async fn predict(&self, image: RgbImage) -> Result<PredictionSet, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Predict {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns the backend, so inference handles are never entered
/// concurrently. Requests are served in arrival order until every handle is
/// dropped. A panicking prediction is answered with an empty set and the
/// thread keeps serving.
pub fn spawn_engine(
    capability: CapabilityClass,
    mut backend: Box<dyn Recognizer>,
) -> Result<EngineHandle, EngineError> {
    let descriptor = backend.identity();
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(QUEUE_DEPTH);

    let thread_name = format!("handmat-{capability}");
    let backend_name = descriptor.name.clone();
    std::thread::Builder::new().name(thread_name).spawn(move || {
        tracing::info!(%capability, backend = %backend_name, "engine thread started");
        while let Some(req) = rx.blocking_recv() {
            match req {
                EngineRequest::Predict { image, reply } => {
                    let started = std::time::Instant::now();
                    let predictions =
                        match catch_unwind(AssertUnwindSafe(|| backend.predict(&image))) {
                            Ok(predictions) => predictions,
                            Err(_) => {
                                tracing::error!(
                                    %capability,
                                    backend = %backend_name,
                                    "backend panicked during prediction; returning empty result"
                                );
                                PredictionSet::empty()
                            }
                        };
                    tracing::debug!(
                        %capability,
                        predictions = predictions.len(),
                        top = ?predictions.top().map(|p| p.label.as_str()),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "prediction complete"
                    );
                    let _ = reply.send(predictions);
                }
            }
        }
        tracing::info!(%capability, "engine thread exiting");
    })?;

    Ok(EngineHandle {
        descriptor,
        tx,
    })
}
