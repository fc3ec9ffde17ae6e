//! Outbound submission: payload layout, relay boundary, and the non-reentrant pipeline.

pub mod payload;
pub mod pipeline;
pub mod relay;

pub use payload::{compose_application_message, Provenance, RelayRequest, SubmissionContext};
pub use pipeline::{SubmissionError, SubmissionPipeline, SubmissionReceipt};
pub use relay::{HttpRelay, RelayAck, RelayError, RelayTransport};
