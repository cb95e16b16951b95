pub mod config;
pub mod error;
pub mod events;
pub mod humanize;
pub mod observability;
pub mod orchestrator;
pub mod progress;
pub mod selection;
pub mod transport;
pub mod validation;

pub use error::UploadError;
pub use events::{EventHub, EventKind, Flow, HookError, UploadEvent};
pub use orchestrator::{
    NotReady, UploadOrchestrator, UploadOutcome, UploadSession, UploadState, UrlParams,
};
pub use progress::{Clock, ProgressCalculator, ProgressReport, ProgressSample, SystemClock};
pub use selection::{FileBody, FileDescriptor, FilePicker, FileSelection, PathPicker, PickError};
pub use transport::{
    HttpTransporter, TransportError, TransportResponse, Transporter, UploadRequest, UserData,
};
pub use validation::{MimePattern, ValidationError, validate};
