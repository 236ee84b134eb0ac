//! Call bounded context - per-call session state and the provider port

pub mod event;
pub mod gateway;
pub mod session;
pub mod value_object;

pub use event::{CallEvent, CallIds, IncomingCallOffer, ProgressEvent, ProgressKind, RecordingFileStatus};
pub use gateway::{CallConnectionProperties, CreateCallRequest, ProviderGateway, RecognizeDtmfRequest};
pub use session::CallSession;
pub use value_object::{CallDirection, CallPhase, Prompt, RecognizeFailureReason, RejectReason};
