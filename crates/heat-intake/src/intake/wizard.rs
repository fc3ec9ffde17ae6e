use std::fmt;

use tracing::{debug, info, warn};

use super::domain::{AnswerPatch, AnswerSet, ErrorMap, Field, Step};
use super::draft::DraftStore;
use super::eligibility::{evaluate, EligibilityHint};
use super::events::{Notice, WizardEvent, WizardListener, WizardSnapshot, FORM_ANCHOR};
use super::review::ReviewSummary;
use super::spam::Honeypot;
use super::submission::payload::{Provenance, RelayRequest, SubmissionContext};
use super::submission::pipeline::{SubmissionError, SubmissionReceipt};
use super::submission::relay::{accepted, RelayAck, RelayError};
use super::validation::{normalize_postcode, validate_step, FieldIssue, StepValidation};

/// Advancing was refused because the current step has invalid fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRejected {
    pub step: Step,
    pub issues: Vec<FieldIssue>,
}

impl StepRejected {
    fn from_report(report: StepValidation) -> Option<Self> {
        (!report.is_valid()).then_some(Self {
            step: report.step,
            issues: report.issues,
        })
    }

    pub fn first_message(&self) -> &str {
        self.issues
            .first()
            .map(|issue| issue.message)
            .unwrap_or("Fix the highlighted fields")
    }
}

impl fmt::Display for StepRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.first_message())
    }
}

impl std::error::Error for StepRejected {}

/// A validated submission ready to hand to the relay.
#[derive(Debug, Clone)]
pub(crate) struct PreparedSubmission {
    pub(crate) request: RelayRequest,
    pub(crate) hints: Vec<EligibilityHint>,
}

/// Controller owning the answers, the active step, and the error map.
///
/// All state changes go through the methods below; each one persists the
/// draft (write-through) and notifies subscribed listeners.
pub struct IntakeWizard {
    answers: AnswerSet,
    step: Step,
    errors: ErrorMap,
    honeypot: Honeypot,
    provenance: Provenance,
    drafts: DraftStore,
    listeners: Vec<Box<dyn WizardListener>>,
}

impl fmt::Debug for IntakeWizard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakeWizard")
            .field("step", &self.step)
            .field("errors", &self.errors)
            .field("drafts", &self.drafts)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl IntakeWizard {
    /// Resumes from the stored draft when one is readable, otherwise starts empty.
    pub fn new(drafts: DraftStore, provenance: Provenance) -> Self {
        let (answers, step) = match drafts.load() {
            Some(draft) => {
                debug!(step = %draft.step, "resuming intake draft");
                (draft.answer_set, draft.step)
            }
            None => (AnswerSet::default(), Step::FIRST),
        };

        Self {
            answers,
            step,
            errors: ErrorMap::default(),
            honeypot: Honeypot::default(),
            provenance,
            drafts,
            listeners: Vec::new(),
        }
    }

    pub fn subscribe<L>(&mut self, listener: L)
    where
        L: WizardListener + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn hints(&self) -> Vec<EligibilityHint> {
        evaluate(&self.answers)
    }

    pub fn review(&self) -> ReviewSummary {
        ReviewSummary::from_answers(&self.answers)
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        WizardSnapshot {
            anchor: FORM_ANCHOR,
            step: self.step,
            step_title: self.step.title(),
            progress_percent: self.step.progress_percent(),
            answers: self.answers.clone(),
            errors: self.errors.clone(),
            hints: self.hints(),
        }
    }

    /// Merge a partial edit. Errors on edited fields are dropped; nothing is validated.
    pub fn update(&mut self, patch: AnswerPatch) {
        let touched = self.answers.apply(patch);
        if touched.is_empty() {
            return;
        }
        for field in touched {
            self.errors.remove(field);
        }
        self.changed();
    }

    pub fn set_benefit(&mut self, benefit: &str, selected: bool) {
        let changed = if selected {
            self.answers.benefits.insert(benefit.to_string())
        } else {
            self.answers.benefits.remove(benefit)
        };
        if changed {
            self.errors.remove(Field::Benefits);
            self.changed();
        }
    }

    /// Loss-of-focus hook for the postcode input.
    pub fn normalize_postcode(&mut self) {
        let normalized = normalize_postcode(&self.answers.postcode);
        if normalized != self.answers.postcode {
            self.answers.postcode = normalized;
            self.changed();
        }
    }

    pub fn set_honeypot(&mut self, value: impl Into<String>) {
        self.honeypot.set(value);
    }

    /// Re-run the rules for `step`, replacing every error that step owns.
    pub fn validate(&mut self, step: Step) -> StepValidation {
        let report = validate_step(&self.answers, step);
        for field in step.fields() {
            self.errors.remove(*field);
        }
        for issue in &report.issues {
            self.errors.insert(issue.field, issue.message);
        }
        report
    }

    pub fn advance(&mut self) -> Result<Step, StepRejected> {
        if self.step == Step::PROPERTY {
            self.answers.postcode = normalize_postcode(&self.answers.postcode);
        }

        let report = self.validate(self.step);
        if let Some(rejected) = StepRejected::from_report(report) {
            debug!(step = %self.step, invalid = rejected.issues.len(), "intake step blocked");
            self.notify(WizardEvent::Notice(Notice::fix_fields(
                rejected.first_message(),
            )));
            self.changed();
            return Err(rejected);
        }

        self.step = self.step.next();
        debug!(step = %self.step, "intake advanced");
        self.changed();
        Ok(self.step)
    }

    pub fn retreat(&mut self) -> Step {
        let previous = self.step.previous();
        if previous != self.step {
            self.step = previous;
            debug!(step = %self.step, "intake stepped back");
            self.changed();
        }
        self.step
    }

    /// Back to an empty first step; the stored draft is removed, not overwritten.
    pub fn reset(&mut self) {
        self.answers = AnswerSet::default();
        self.step = Step::FIRST;
        self.errors.clear();
        self.honeypot.clear();
        if let Err(err) = self.drafts.clear() {
            warn!(error = %err, "failed to clear intake draft");
        }
        self.emit_state();
    }

    pub(crate) fn notice(&self, notice: Notice) {
        self.notify(WizardEvent::Notice(notice));
    }

    pub(crate) fn prepare_submission(
        &mut self,
        access_key: Option<&str>,
        context: &SubmissionContext,
    ) -> Result<PreparedSubmission, SubmissionError> {
        if self.step != Step::REVIEW {
            debug!(step = %self.step, "intake submission refused before review");
            self.notice(Notice::review_first());
            return Err(SubmissionError::NotOnReview { step: self.step });
        }

        if let Err(rejected) = self.honeypot.check() {
            info!("intake submission blocked by honeypot");
            self.notice(Notice::spam_blocked());
            return Err(rejected.into());
        }

        let report = self.validate(Step::CONTACT);
        if let Some(rejected) = StepRejected::from_report(report) {
            self.notice(Notice::fix_fields(rejected.first_message()));
            self.emit_state();
            return Err(rejected.into());
        }

        let Some(access_key) = access_key else {
            warn!("relay access key missing; submission not attempted");
            self.notice(Notice::not_configured());
            return Err(SubmissionError::NotConfigured);
        };

        let hints = self.hints();
        let request = RelayRequest::application(
            access_key,
            &self.answers,
            &hints,
            &self.provenance,
            context,
            self.honeypot.value(),
        );
        Ok(PreparedSubmission { request, hints })
    }

    pub(crate) fn finish_submission(
        &mut self,
        outcome: Result<RelayAck, RelayError>,
        prepared: PreparedSubmission,
        context: &SubmissionContext,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        match outcome.and_then(accepted) {
            Ok(ack) => {
                info!("intake submission accepted by relay");
                self.notice(Notice::submitted());
                self.notify(WizardEvent::Submitted);
                self.reset();
                Ok(SubmissionReceipt {
                    submitted_at: context.submitted_at,
                    eligibility: prepared.hints,
                    relay_message: ack.message,
                })
            }
            Err(err) => {
                warn!(error = %err, "intake submission failed; answers kept for retry");
                self.notice(Notice::send_failed());
                Err(err.into())
            }
        }
    }

    fn changed(&mut self) {
        if let Err(err) = self.drafts.save(&self.answers, self.step) {
            warn!(error = %err, "failed to persist intake draft");
        }
        self.emit_state();
    }

    fn emit_state(&self) {
        if self.listeners.is_empty() {
            return;
        }
        self.notify(WizardEvent::StateChanged(self.snapshot()));
    }

    fn notify(&self, event: WizardEvent) {
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }
}
