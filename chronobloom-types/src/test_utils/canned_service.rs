//! CannedService: a prediction service with queued answers.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::InvocationError;
use crate::prediction::PredictionRequest;
use crate::service::PredictionService;

/// A [`PredictionService`] that pops a queued answer per call.
///
/// Once the queue is drained every call returns
/// [`InvocationError::EmptyResponse`].
pub struct CannedService {
    model: String,
    answers: Mutex<VecDeque<Result<String, InvocationError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl CannedService {
    /// A service answering once with `text`.
    pub fn text(text: impl Into<String>) -> Self {
        Self::answers(vec![Ok(text.into())])
    }

    /// A service failing once with `error`.
    pub fn failing(error: InvocationError) -> Self {
        Self::answers(vec![Err(error)])
    }

    /// A service answering with each entry in turn.
    pub fn answers(answers: Vec<Result<String, InvocationError>>) -> Self {
        Self {
            model: "canned-model".into(),
            answers: Mutex::new(answers.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl PredictionService for CannedService {
    fn model(&self) -> &str {
        &self.model
    }

    fn invoke(
        &self,
        request: &PredictionRequest,
    ) -> impl std::future::Future<Output = Result<String, InvocationError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }
        let answer = self
            .answers
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or(Err(InvocationError::EmptyResponse));
        async move { answer }
    }
}
