//! The Prediction protocol: a generative service behind one call.

use std::future::Future;

use crate::error::InvocationError;
use crate::prediction::PredictionRequest;

/// Protocol ④: Prediction
///
/// Sends a rendered prompt and returns the raw response text, unmodified.
/// One attempt per call; retry policy belongs to whoever schedules runs.
///
/// This trait uses RPITIT and is NOT object-safe. Stages that need a
/// service are generic over it.
pub trait PredictionService: Send + Sync {
    /// Identifier of the model behind this service, recorded as provenance.
    fn model(&self) -> &str;

    /// Send `request.prompt` and return the raw text of the answer.
    fn invoke(
        &self,
        request: &PredictionRequest,
    ) -> impl Future<Output = Result<String, InvocationError>> + Send;
}
