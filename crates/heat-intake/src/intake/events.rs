use serde::Serialize;
use tracing::{info, warn};

use super::domain::{AnswerSet, ErrorMap, Step};
use super::eligibility::EligibilityHint;

/// In-page anchor the wizard root exposes for header/CTA navigation.
pub const FORM_ANCHOR: &str = "eligibility-form";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Destructive,
}

/// One-shot user-facing notification (rendered as a toast by the surface).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub level: NoticeLevel,
}

impl Notice {
    fn destructive(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            level: NoticeLevel::Destructive,
        }
    }

    pub fn fix_fields(first_message: &str) -> Self {
        Self::destructive("Fix the highlighted fields", first_message)
    }

    pub fn spam_blocked() -> Self {
        Self::destructive("Submission blocked", "Please contact us directly.")
    }

    pub fn not_configured() -> Self {
        Self::destructive(
            "Missing API key",
            "Add RELAY_ACCESS_KEY in your environment.",
        )
    }

    pub fn send_failed() -> Self {
        Self::destructive(
            "Could not send",
            "We couldn't send your details automatically. Please try again or contact us on WhatsApp.",
        )
    }

    pub fn review_first() -> Self {
        Self::destructive(
            "Review your answers",
            "Please complete every step and review your answers before submitting.",
        )
    }

    pub fn in_flight() -> Self {
        Self::destructive(
            "Submission in progress",
            "Please wait for the current submission to finish.",
        )
    }

    pub fn referrals_incomplete() -> Self {
        Self::destructive(
            "Please fill in all required fields",
            "Name, phone number, and address are required for each referral.",
        )
    }

    pub fn referrals_submitted() -> Self {
        Self {
            title: "Referrals Submitted!".to_string(),
            description: "Thank you for your referrals. We'll contact them within 24 hours."
                .to_string(),
            level: NoticeLevel::Info,
        }
    }

    pub fn referrals_failed() -> Self {
        Self::destructive(
            "Error",
            "There was a problem submitting your referrals. Please try again.",
        )
    }

    pub fn submitted() -> Self {
        Self {
            title: "Application submitted!".to_string(),
            description: "Thank you — we'll be in touch within 24 hours.".to_string(),
            level: NoticeLevel::Info,
        }
    }
}

/// Observable wizard state, as handed to listeners and API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSnapshot {
    pub anchor: &'static str,
    pub step: Step,
    pub step_title: &'static str,
    pub progress_percent: u8,
    pub answers: AnswerSet,
    pub errors: ErrorMap,
    pub hints: Vec<EligibilityHint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardEvent {
    StateChanged(WizardSnapshot),
    Notice(Notice),
    /// Successful submission; the surface shows its confirmation dialog.
    Submitted,
}

/// Subscription hook standing in for re-rendering.
pub trait WizardListener: Send {
    fn on_event(&self, event: &WizardEvent);
}

impl<F> WizardListener for F
where
    F: Fn(&WizardEvent) + Send,
{
    fn on_event(&self, event: &WizardEvent) {
        self(event)
    }
}

/// Mirrors notices and confirmations into the trace log.
#[derive(Debug, Clone, Default)]
pub struct TracingListener {
    pub session: String,
}

impl WizardListener for TracingListener {
    fn on_event(&self, event: &WizardEvent) {
        match event {
            WizardEvent::Notice(notice) if notice.level == NoticeLevel::Destructive => {
                warn!(session = %self.session, title = %notice.title, "intake notice");
            }
            WizardEvent::Notice(notice) => {
                info!(session = %self.session, title = %notice.title, "intake notice");
            }
            WizardEvent::Submitted => {
                info!(session = %self.session, "intake confirmation shown");
            }
            WizardEvent::StateChanged(_) => {}
        }
    }
}
