//! Deadline and cancellation wrapper for collaborator calls

use crate::error::PipelineError;
use crate::state::Stage;
use hcp_domain::ProviderFailure;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Run one collaborator call under a deadline and the run's cancellation
/// token.
///
/// The outer `Result` carries what ends the run (cancellation, fatal
/// collaborator errors). The inner one carries what only degrades the unit
/// of work: timeouts and every other collaborator failure, as a message.
pub(crate) async fn guarded<T, E, F>(
    stage: Stage,
    limit: Duration,
    cancel: &CancellationToken,
    call: F,
) -> Result<Result<T, String>, PipelineError>
where
    F: Future<Output = Result<T, E>>,
    E: ProviderFailure,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        outcome = timeout(limit, call) => match outcome {
            Err(_) => Ok(Err(format!("timed out after {}s", limit.as_secs()))),
            Ok(Ok(value)) => Ok(Ok(value)),
            Ok(Err(e)) if e.is_fatal() => Err(PipelineError::Fatal {
                stage,
                message: e.to_string(),
            }),
            Ok(Err(e)) => Ok(Err(e.to_string())),
        },
    }
}

/// Fail with `Cancelled` if the token has fired
pub(crate) fn ensure_active(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}
