//! Build orchestrator.
//!
//! Owns the lifecycle of one solve call: the progress relay starts before the
//! call is issued, the call's completion drops the event sender and thereby
//! closes the relay's channel, and the orchestrator returns only after the
//! relay has drained. Exactly one solve is issued per invocation; retry
//! policy, if any, lives in the backend connection layer.

use tokio::sync::mpsc::Sender;

use crate::backend::{BackendConnection, SolveOutput};
use crate::error::BuildError;
use crate::progress::{ProgressEvent, ProgressRelay};
use crate::solve::{BuildOptions, SolveRequest};

/// Runs one build against the backend, rendering progress per the options'
/// progress mode.
pub async fn run(
    backend: &dyn BackendConnection,
    opts: &BuildOptions,
) -> Result<SolveOutput, BuildError> {
    let request = SolveRequest::from_options(opts);
    let (relay, sender) = ProgressRelay::start(opts.progress);
    run_with_relay(backend, request, relay, sender).await
}

/// Runs one build with an already-started relay. The solve error wins when
/// both the call and the relay fail.
pub async fn run_with_relay(
    backend: &dyn BackendConnection,
    request: SolveRequest,
    relay: ProgressRelay,
    sender: Option<Sender<ProgressEvent>>,
) -> Result<SolveOutput, BuildError> {
    let solve_result = backend.solve(request, sender).await;
    // The sender dropped with the call; the relay now drains whatever is
    // still buffered and exits on channel closure.
    let relay_result = relay.finish().await;

    match solve_result {
        Err(err) => Err(err),
        Ok(output) => {
            relay_result?;
            tracing::debug!(exporter_response = ?output.exporter_response, "solve completed");
            Ok(output)
        }
    }
}
