//! Multi-step eligibility intake for the heating grant lead funnel.
//!
//! The wizard walks a visitor through household, property, and contact steps,
//! persists a draft after every change, and hands the final answers to a mail
//! relay through a non-reentrant submission pipeline.

pub mod domain;
pub mod draft;
pub mod eligibility;
pub mod events;
pub mod referral;
pub mod review;
pub mod router;
pub mod session;
pub mod spam;
pub mod submission;
pub mod validation;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use domain::{
    AnswerPatch, AnswerSet, BoilerAge, ContactMethod, ContactTime, EpcRating, ErrorMap, Field,
    GasSupply, HeatingType, PropertyRelationship, PropertyType, Step, BENEFIT_OPTIONS,
};
pub use draft::{
    Draft, DraftBackend, DraftError, DraftStore, FileDraftBackend, MemoryDraftBackend,
    DRAFT_STORAGE_KEY,
};
pub use eligibility::{evaluate, summary_line, EligibilityHint, QUALIFYING_BENEFITS};
pub use events::{
    Notice, NoticeLevel, TracingListener, WizardEvent, WizardListener, WizardSnapshot, FORM_ANCHOR,
};
pub use referral::{ReferralBatch, ReferralEntry, ReferralError, ReferralField, REFERRAL_ANCHOR};
pub use review::{ReviewRow, ReviewSection, ReviewSummary};
pub use router::intake_router;
pub use session::{
    DraftStoreFactory, FileDraftFactory, IntakeSession, IntakeSessions, MemoryDraftFactory,
    SessionError, SessionId, DEFAULT_SESSION_IDLE,
};
pub use spam::{Honeypot, SpamRejected, HONEYPOT_FIELD};
pub use submission::{
    HttpRelay, Provenance, RelayAck, RelayError, RelayRequest, RelayTransport, SubmissionContext,
    SubmissionError, SubmissionPipeline, SubmissionReceipt,
};
pub use validation::{
    is_valid_email, is_valid_phone, is_valid_postcode, normalize_postcode, validate_step,
    FieldIssue, StepValidation,
};
pub use wizard::{IntakeWizard, StepRejected};
