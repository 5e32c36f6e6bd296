//! Large-payload uploads: planning, part transmission, progress and the
//! orchestrating state machine.

mod options;
mod orchestrator;
mod parts;
mod plan;
mod progress;
mod protocol;
mod result;
mod session;
mod source;
mod state;
mod transmit;

pub use options::{FileUploadOptions, UploadMetadata, DEFAULT_MAX_CONCURRENT_PARTS};
pub use orchestrator::UploadOrchestrator;
pub use parts::PartSet;
pub use plan::{plan_upload, PartRange, UploadLimits, UploadMode, UploadPlan};
pub use progress::{FileUploadProgress, ProgressAggregator, ProgressObserver, UploadStatus};
pub use protocol::{FileUploadsApi, UploadProtocol};
pub use result::{UploadFailure, UploadResult, UploadSuccess};
pub use session::UploadSession;
pub use source::UploadSource;
pub use state::UploadState;
pub use transmit::PartTransmitter;
