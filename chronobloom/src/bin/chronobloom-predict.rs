//! Prediction bridge: Splunk history in, Gemini predictions back into Splunk.
//!
//! Configured from the environment (and `.env`). Exits 1 on configuration
//! errors only; a failed invocation is logged and left for the next
//! scheduled run.

use std::process::ExitCode;
use std::sync::Arc;

use chronobloom::chronobloom_predict::{PredictionBridge, PredictionIngestor};
use chronobloom::chronobloom_splunk::Splunk;
use chronobloom::config::BridgeConfig;
use chronobloom::logging;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    logging::init();

    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let splunk = match Splunk::new(config.splunk.clone()) {
        Ok(splunk) => Arc::new(splunk),
        Err(e) => {
            tracing::error!(error = %e, "could not build Splunk client");
            return ExitCode::FAILURE;
        }
    };

    let bridge = PredictionBridge::new(
        splunk.clone(),
        config.gemini(),
        PredictionIngestor::new(splunk.clone(), splunk),
    )
    .filter(config.filter.clone())
    .window(config.window.clone())
    .policy(config.policy)
    .partition(config.prediction_index.clone());

    match bridge.run().await {
        Ok(report) => tracing::info!(
            observations = report.observations,
            targets = report.targets,
            extracted = report.extracted,
            rejected = report.rejected,
            ingested = report.ingest.succeeded,
            failed = report.ingest.failed,
            partition = %report.ingest.partition,
            "prediction run complete"
        ),
        Err(e) => tracing::error!(error = %e, retryable = e.is_retryable(), "prediction run failed"),
    }
    ExitCode::SUCCESS
}
