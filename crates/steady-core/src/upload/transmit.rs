//! Sends one part through the retry governor.

use std::sync::Arc;

use super::options::UploadMetadata;
use super::progress::ProgressAggregator;
use super::protocol::UploadProtocol;
use crate::error::{CallFailure, SteadyError};
use crate::retry::RetryGovernor;
use crate::transport::Transport;

/// Per-upload part sender. Clones share transport, protocol and progress.
pub struct PartTransmitter<T, P> {
    transport: Arc<T>,
    protocol: Arc<P>,
    governor: RetryGovernor,
    progress: Arc<ProgressAggregator>,
    metadata: Arc<UploadMetadata>,
}

impl<T, P> Clone for PartTransmitter<T, P> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            protocol: Arc::clone(&self.protocol),
            governor: self.governor.clone(),
            progress: Arc::clone(&self.progress),
            metadata: Arc::clone(&self.metadata),
        }
    }
}

impl<T: Transport, P: UploadProtocol> PartTransmitter<T, P> {
    pub fn new(
        transport: Arc<T>,
        protocol: Arc<P>,
        governor: RetryGovernor,
        progress: Arc<ProgressAggregator>,
        metadata: UploadMetadata,
    ) -> Self {
        Self {
            transport,
            protocol,
            governor,
            progress,
            metadata: Arc::new(metadata),
        }
    }

    pub fn progress(&self) -> &Arc<ProgressAggregator> {
        &self.progress
    }

    /// Send `bytes` as part `part_number` (None for a single-shot upload).
    ///
    /// Each call has its own retry budget. On success the byte count is
    /// reported to the progress aggregator; a terminal failure of a numbered
    /// part comes back as [`SteadyError::PartUpload`].
    pub async fn send_part(
        &self,
        session_id: &str,
        part_number: Option<u32>,
        bytes: Vec<u8>,
    ) -> Result<(), CallFailure> {
        let len = bytes.len() as u64;
        let request = self.protocol.send_part(session_id, part_number, &bytes, &self.metadata);
        drop(bytes);

        let result = self.governor.send(&*self.transport, &request).await;

        match result {
            Ok(_) => {
                self.progress.record_part_complete(part_number.unwrap_or(1), len);
                if let Some(n) = part_number {
                    tracing::debug!(part_number = n, bytes = len, "part uploaded");
                }
                Ok(())
            }
            Err(failure) => match part_number {
                Some(n) => Err(CallFailure::new(
                    SteadyError::PartUpload {
                        part_number: n,
                        source: Box::new(failure.error),
                    },
                    failure.attempts,
                )),
                None => Err(failure),
            },
        }
    }
}
