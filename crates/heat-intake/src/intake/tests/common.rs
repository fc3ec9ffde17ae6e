use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;
use tokio::sync::Notify;

use crate::intake::domain::{
    AnswerSet, ContactMethod, ContactTime, GasSupply, HeatingType, PropertyRelationship, Step,
};
use crate::intake::draft::{DraftStore, MemoryDraftBackend};
use crate::intake::events::{Notice, WizardEvent};
use crate::intake::session::{IntakeSessions, MemoryDraftFactory};
use crate::intake::submission::payload::{Provenance, RelayRequest};
use crate::intake::submission::relay::{RelayAck, RelayError, RelayTransport};
use crate::intake::wizard::IntakeWizard;

pub(super) const ACCESS_KEY: &str = "test-access-key";

pub(super) fn household_answers() -> AnswerSet {
    let mut answers = AnswerSet {
        property_relationship: Some(PropertyRelationship::Homeowner),
        adults: "2".to_string(),
        ..AnswerSet::default()
    };
    answers.benefits.insert("Universal Credit".to_string());
    answers
}

/// An answer set that passes every step.
pub(super) fn complete_answers() -> AnswerSet {
    AnswerSet {
        postcode: "SW1A 1AA".to_string(),
        address: "10 Downing Street, London".to_string(),
        has_gas: Some(GasSupply::No),
        current_heating: Some(HeatingType::ElectricStorage),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: "ada@example.co.uk".to_string(),
        phone: "07123 456789".to_string(),
        preferred_contact: Some(ContactMethod::Phone),
        contact_time: Some(ContactTime::Morning),
        consent_contact: true,
        consent_privacy: true,
        ..household_answers()
    }
}

pub(super) fn memory_store() -> (DraftStore, Arc<MemoryDraftBackend>) {
    let backend = Arc::new(MemoryDraftBackend::default());
    (DraftStore::new(backend.clone()), backend)
}

pub(super) fn fresh_wizard() -> (IntakeWizard, Arc<MemoryDraftBackend>) {
    let (store, backend) = memory_store();
    (IntakeWizard::new(store, Provenance::default()), backend)
}

/// Wizard resumed from a draft holding `answers` on `step`.
pub(super) fn wizard_on(answers: AnswerSet, step: Step) -> (IntakeWizard, Arc<MemoryDraftBackend>) {
    let (store, backend) = memory_store();
    store.save(&answers, step).expect("seed draft");
    (IntakeWizard::new(store, Provenance::default()), backend)
}

/// Wizard with `answers` already in place, positioned on `Step::CONTACT`.
pub(super) fn wizard_with(answers: AnswerSet) -> (IntakeWizard, Arc<MemoryDraftBackend>) {
    wizard_on(answers, Step::CONTACT)
}

/// Wizard ready to submit: `answers` in place on the review step.
pub(super) fn review_wizard(answers: AnswerSet) -> (IntakeWizard, Arc<MemoryDraftBackend>) {
    wizard_on(answers, Step::REVIEW)
}

pub(super) fn record_events(wizard: &mut IntakeWizard) -> Arc<Mutex<Vec<WizardEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    wizard.subscribe(move |event: &WizardEvent| {
        sink.lock().expect("event mutex poisoned").push(event.clone());
    });
    events
}

pub(super) fn notices(events: &Arc<Mutex<Vec<WizardEvent>>>) -> Vec<Notice> {
    events
        .lock()
        .expect("event mutex poisoned")
        .iter()
        .filter_map(|event| match event {
            WizardEvent::Notice(notice) => Some(notice.clone()),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub(super) enum Reply {
    Accept,
    Reject(&'static str),
    Unreachable,
}

/// Relay double that records every request it is handed.
#[derive(Debug)]
pub(super) struct RecordingRelay {
    reply: Reply,
    requests: Mutex<Vec<RelayRequest>>,
}

impl RecordingRelay {
    pub(super) fn new(reply: Reply) -> Self {
        Self {
            reply,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn requests(&self) -> Vec<RelayRequest> {
        self.requests.lock().expect("relay mutex poisoned").clone()
    }
}

#[async_trait]
impl RelayTransport for RecordingRelay {
    async fn send(&self, request: &RelayRequest) -> Result<RelayAck, RelayError> {
        self.requests
            .lock()
            .expect("relay mutex poisoned")
            .push(request.clone());
        match self.reply {
            Reply::Accept => Ok(RelayAck {
                success: true,
                message: Some("Email sent successfully!".to_string()),
            }),
            Reply::Reject(message) => Ok(RelayAck {
                success: false,
                message: Some(message.to_string()),
            }),
            Reply::Unreachable => Err(RelayError::Transport("connection refused".to_string())),
        }
    }
}

/// Relay double that parks each send until `release` is notified.
#[derive(Debug, Default)]
pub(super) struct PendingRelay {
    pub(super) started: Notify,
    pub(super) release: Notify,
    requests: Mutex<usize>,
}

impl PendingRelay {
    pub(super) fn sends(&self) -> usize {
        *self.requests.lock().expect("relay mutex poisoned")
    }
}

#[async_trait]
impl RelayTransport for PendingRelay {
    async fn send(&self, _request: &RelayRequest) -> Result<RelayAck, RelayError> {
        *self.requests.lock().expect("relay mutex poisoned") += 1;
        self.started.notify_one();
        self.release.notified().await;
        Ok(RelayAck {
            success: true,
            message: None,
        })
    }
}

pub(super) fn sessions_with(
    relay: Arc<dyn RelayTransport>,
    access_key: Option<&str>,
) -> Arc<IntakeSessions> {
    Arc::new(IntakeSessions::new(
        Arc::new(MemoryDraftFactory::default()),
        relay,
        access_key.map(str::to_string),
    ))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("valid json")
}

pub(super) async fn assert_status(response: Response, expected: StatusCode) -> Value {
    assert_eq!(response.status(), expected);
    read_json_body(response).await
}
