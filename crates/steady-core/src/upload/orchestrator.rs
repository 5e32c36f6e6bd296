//! Upload state machine: plan, initiate, transmit parts on a bounded pool, complete.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::Instant;

use super::options::FileUploadOptions;
use super::plan::{plan_upload, PartRange, UploadPlan};
use super::progress::ProgressAggregator;
use super::protocol::UploadProtocol;
use super::result::{UploadFailure, UploadResult, UploadSuccess};
use super::session::UploadSession;
use super::source::UploadSource;
use super::state::UploadState;
use super::transmit::PartTransmitter;
use crate::control::UploadControl;
use crate::error::{CallFailure, SteadyError};
use crate::retry::RetryGovernor;
use crate::transport::Transport;

/// Runs uploads against one endpoint. Each `upload` call is independent.
pub struct UploadOrchestrator<T, P> {
    transport: Arc<T>,
    protocol: Arc<P>,
    governor: RetryGovernor,
}

/// Tracks the current state and mirrors it into progress.
struct Lifecycle {
    state: UploadState,
    progress: Option<Arc<ProgressAggregator>>,
}

impl Lifecycle {
    fn advance(&mut self, next: UploadState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(from = %self.state, to = %next, "unexpected upload state transition");
        }
        tracing::info!(from = %self.state, to = %next, "upload state");
        self.state = next;
        if let Some(progress) = &self.progress {
            progress.set_status(next.progress_status());
        }
    }

    /// Move to Failed (or Cancelled) and build the failure result.
    fn fail(&mut self, error: SteadyError, attempts: u32) -> UploadResult {
        let phase = self.state;
        let terminal = if matches!(error, SteadyError::Cancelled) {
            UploadState::Cancelled
        } else {
            tracing::warn!(phase = %phase, attempts, error = %error, "upload failed");
            UploadState::Failed
        };
        self.advance(terminal);
        UploadResult::Failure(UploadFailure {
            phase,
            error,
            attempts,
            progress: self.progress.as_ref().map(|p| p.snapshot()),
        })
    }

    fn fail_call(&mut self, failure: CallFailure) -> UploadResult {
        self.fail(failure.error, failure.attempts)
    }
}

impl<T: Transport, P: UploadProtocol> UploadOrchestrator<T, P> {
    pub fn new(transport: Arc<T>, protocol: Arc<P>, governor: RetryGovernor) -> Self {
        Self {
            transport,
            protocol,
            governor,
        }
    }

    /// Upload `source` and return its terminal result.
    ///
    /// Never panics on API failures: every error ends as
    /// [`UploadResult::Failure`] naming the phase it happened in.
    pub async fn upload(
        &self,
        source: UploadSource,
        options: &FileUploadOptions,
        control: &UploadControl,
    ) -> UploadResult {
        let started = Instant::now();
        let mut life = Lifecycle {
            state: UploadState::Planning,
            progress: None,
        };

        let plan = match plan_upload(source.len(), options.limits()) {
            Ok(plan) => plan,
            Err(e) => return life.fail(e, 0),
        };
        tracing::debug!(
            total_bytes = plan.total_bytes,
            mode = ?plan.mode,
            part_size = plan.part_size,
            part_count = plan.part_count,
            "upload planned"
        );
        let progress = Arc::new(ProgressAggregator::new(
            plan.total_bytes,
            plan.is_multipart().then_some(plan.part_count),
            options.observer().cloned(),
        ));
        life.progress = Some(Arc::clone(&progress));

        life.advance(UploadState::Initiating);
        let request = self.protocol.initiate(&plan, options.metadata());
        let (response, attempts) = match self.governor.send_counted(&*self.transport, &request).await {
            Ok(counted) => counted,
            Err(failure) => return life.fail_call(failure),
        };
        let session_id = match self.protocol.session_id(&response) {
            Ok(id) => id,
            Err(e) => return life.fail(e, attempts),
        };
        let mut session = UploadSession::new(session_id, plan);

        life.advance(UploadState::Transmitting);
        if control.is_cancelled() {
            return life.fail(SteadyError::Cancelled, 0);
        }

        let part_governor = self
            .governor
            .clone()
            .with_attempt_timeout(options.part_timeout().or(self.governor.attempt_timeout()));
        let transmitter = PartTransmitter::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.protocol),
            part_governor,
            Arc::clone(&progress),
            options.metadata().clone(),
        );

        if !plan.is_multipart() {
            let bytes = match source.read_range(0, plan.total_bytes).await {
                Ok(b) => b,
                Err(e) => return life.fail(e, 0),
            };
            if let Err(failure) = transmitter.send_part(session.id(), None, bytes).await {
                return life.fail_call(failure);
            }
            session.record_part(1);
            life.advance(UploadState::Completed);
            return success(session, progress, started);
        }

        if let Err(failure) = transmit_parts(
            &transmitter,
            &source,
            &mut session,
            options.effective_concurrency(),
            control,
        )
        .await
        {
            return life.fail_call(failure);
        }

        if !session.is_complete() {
            if control.is_cancelled() {
                return life.fail(SteadyError::Cancelled, 0);
            }
            let missing: Vec<u32> = session.parts_completed().missing().collect();
            return life.fail(
                SteadyError::Unknown {
                    status: None,
                    detail: format!("parts {:?} never acknowledged", missing),
                },
                0,
            );
        }

        life.advance(UploadState::Completing);
        if control.is_cancelled() {
            return life.fail(SteadyError::Cancelled, 0);
        }
        let request = self.protocol.complete(session.id());
        if let Err(failure) = self.governor.send(&*self.transport, &request).await {
            return life.fail_call(failure);
        }
        life.advance(UploadState::Completed);
        success(session, progress, started)
    }
}

fn success(session: UploadSession, progress: Arc<ProgressAggregator>, started: Instant) -> UploadResult {
    let plan: UploadPlan = *session.plan();
    UploadResult::Success(UploadSuccess {
        session_id: session.id().to_string(),
        elapsed: started.elapsed(),
        progress: progress.snapshot(),
        plan,
    })
}

/// Send every part of the session's plan with at most `max_in_flight` parts
/// running at once.
///
/// Stops scheduling on the first terminal part failure or on cancellation;
/// parts already running are awaited before returning. Returns the first
/// failure, if any.
async fn transmit_parts<T: Transport, P: UploadProtocol>(
    transmitter: &PartTransmitter<T, P>,
    source: &UploadSource,
    session: &mut UploadSession,
    max_in_flight: usize,
    control: &UploadControl,
) -> Result<(), CallFailure> {
    let session_id: Arc<str> = Arc::from(session.id());
    let mut pending: Vec<PartRange> = session.plan().parts().collect();
    pending.reverse();
    let mut join_set: JoinSet<(u32, Result<(), CallFailure>)> = JoinSet::new();
    let mut first_failure: Option<CallFailure> = None;

    loop {
        while first_failure.is_none() && !control.is_cancelled() && join_set.len() < max_in_flight {
            let Some(part) = pending.pop() else {
                break;
            };
            transmitter.progress().mark_scheduled(part.number);
            let tx = transmitter.clone();
            let source = source.clone();
            let session_id = Arc::clone(&session_id);
            join_set.spawn(async move {
                let bytes = match source.read_range(part.start, part.end).await {
                    Ok(b) => b,
                    Err(e) => {
                        let error = SteadyError::PartUpload {
                            part_number: part.number,
                            source: Box::new(e),
                        };
                        return (part.number, Err(CallFailure::new(error, 0)));
                    }
                };
                (part.number, tx.send_part(&session_id, Some(part.number), bytes).await)
            });
        }

        let Some(joined) = join_set.join_next().await else {
            break;
        };
        match joined {
            Ok((part_number, Ok(()))) => {
                session.record_part(part_number);
            }
            Ok((part_number, Err(failure))) => {
                if first_failure.is_none() {
                    tracing::warn!(
                        part_number,
                        in_flight = join_set.len(),
                        "part failed; no further parts will be scheduled"
                    );
                    first_failure = Some(failure);
                }
            }
            Err(e) => {
                if first_failure.is_none() {
                    let error = SteadyError::Unknown {
                        status: None,
                        detail: format!("part task failed: {}", e),
                    };
                    first_failure = Some(CallFailure::new(error, 0));
                }
            }
        }
    }

    match first_failure {
        Some(failure) => Err(failure),
        None => Ok(()),
    }
}
