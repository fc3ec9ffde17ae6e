use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{info, warn};

use super::payload::{RelayRequest, SubmissionContext};
use super::relay::{accepted, RelayAck, RelayError, RelayTransport};
use crate::intake::domain::Step;
use crate::intake::eligibility::EligibilityHint;
use crate::intake::events::Notice;
use crate::intake::referral::{ReferralBatch, ReferralError};
use crate::intake::spam::SpamRejected;
use crate::intake::wizard::{IntakeWizard, StepRejected};

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("a submission is already in progress")]
    InFlight,
    #[error("answers must be reviewed before submitting (currently on step {step})")]
    NotOnReview { step: Step },
    #[error(transparent)]
    Spam(#[from] SpamRejected),
    #[error(transparent)]
    Validation(#[from] StepRejected),
    #[error("relay access key is not configured")]
    NotConfigured,
    #[error(transparent)]
    Relay(#[from] RelayError),
}

/// What the confirmation surface gets back after the relay accepted the message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub submitted_at: DateTime<Local>,
    pub eligibility: Vec<EligibilityHint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_message: Option<String>,
}

/// Cleared on drop so a failed or panicking attempt never wedges the flag.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives one submission at a time from a wizard to the relay.
pub struct SubmissionPipeline {
    transport: Arc<dyn RelayTransport>,
    access_key: Option<String>,
    in_flight: AtomicBool,
}

impl std::fmt::Debug for SubmissionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionPipeline")
            .field("configured", &self.access_key.is_some())
            .field("in_flight", &self.is_in_flight())
            .finish_non_exhaustive()
    }
}

fn lock(wizard: &Mutex<IntakeWizard>) -> MutexGuard<'_, IntakeWizard> {
    wizard.lock().expect("wizard mutex poisoned")
}

impl SubmissionPipeline {
    pub fn new(transport: Arc<dyn RelayTransport>, access_key: Option<String>) -> Self {
        Self {
            transport,
            access_key: access_key.filter(|key| !key.trim().is_empty()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.access_key.is_some()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Submit the wizard's answers. The wizard lock is only held around the
    /// synchronous halves, so edits can continue while the relay call is pending.
    pub async fn submit(
        &self,
        wizard: &Mutex<IntakeWizard>,
        user_agent: &str,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let Some(_flight) = InFlight::acquire(&self.in_flight) else {
            lock(wizard).notice(Notice::in_flight());
            return Err(SubmissionError::InFlight);
        };

        let context = SubmissionContext::now(user_agent);
        let prepared = {
            let mut wizard = lock(wizard);
            wizard.prepare_submission(self.access_key.as_deref(), &context)?
        };

        info!("posting intake submission to relay");
        let outcome = self.transport.send(&prepared.request).await;

        let mut wizard = lock(wizard);
        wizard.finish_submission(outcome, prepared, &context)
    }

    /// Send a referral batch; the batch is reset to one empty entry once the
    /// relay accepts it. Shares the in-flight gate with [`Self::submit`].
    pub async fn submit_referrals(
        &self,
        batch: &mut ReferralBatch,
        context: &SubmissionContext,
    ) -> Result<RelayAck, ReferralError> {
        let Some(_flight) = InFlight::acquire(&self.in_flight) else {
            return Err(ReferralError::InFlight);
        };

        batch.validate()?;
        let access_key = self
            .access_key
            .as_deref()
            .ok_or(ReferralError::NotConfigured)?;

        let request = RelayRequest::referrals(access_key, batch, context);
        info!(referrals = batch.len(), "posting referral batch to relay");
        match self.transport.send(&request).await.and_then(accepted) {
            Ok(ack) => {
                batch.reset();
                Ok(ack)
            }
            Err(err) => {
                warn!(error = %err, "referral batch failed");
                Err(err.into())
            }
        }
    }
}
