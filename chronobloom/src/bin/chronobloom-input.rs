//! Observation acquisition: one JSON event per line on stdout.
//!
//! Arguments are `key=value` tokens (`species_ids=3,35`, `states=CA,NY`,
//! `source=npn`, ...). The process exits 0 whatever happens; a degraded run
//! is signalled by its diagnostic event.

use std::sync::Arc;

use chronobloom::chronobloom_acquire::{AcquisitionPipeline, InputConfig, JsonLinesSink};
use chronobloom::logging;
use rand::SeedableRng;
use rand::rngs::StdRng;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    logging::init();

    let config = InputConfig::from_args(std::env::args().skip(1));
    for (key, value) in config.extra() {
        tracing::debug!(key, value, "ignoring unrecognized setting");
    }

    let report = AcquisitionPipeline::new(Arc::new(JsonLinesSink::stdout()), StdRng::from_entropy())
        .run(&config)
        .await;

    tracing::info!(
        state = ?report.state,
        emitted = report.emitted,
        failed = report.failed,
        error = report.error.as_deref().unwrap_or(""),
        "chronobloom-input finished"
    );
}
