use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::common::*;

use crate::intake::domain::{AnswerPatch, Field, Step};
use crate::intake::draft::DRAFT_STORAGE_KEY;
use crate::intake::eligibility::EligibilityHint;
use crate::intake::events::WizardEvent;
use crate::intake::referral::{ReferralBatch, ReferralError, ReferralField};
use crate::intake::session::{
    DraftStoreFactory, IntakeSessions, MemoryDraftFactory, SessionId,
};
use crate::intake::submission::payload::{Provenance, SubmissionContext};
use crate::intake::submission::pipeline::{SubmissionError, SubmissionPipeline};
use crate::intake::submission::relay::RelayError;

fn pipeline(relay: Arc<RecordingRelay>) -> SubmissionPipeline {
    SubmissionPipeline::new(relay, Some(ACCESS_KEY.to_string()))
}

#[tokio::test]
async fn accepted_submission_resets_the_wizard() {
    let relay = Arc::new(RecordingRelay::new(Reply::Accept));
    let (mut wizard, backend) = review_wizard(complete_answers());
    let events = record_events(&mut wizard);
    let wizard = Mutex::new(wizard);

    let receipt = pipeline(relay.clone())
        .submit(&wizard, "Mozilla/5.0 test")
        .await
        .expect("submission accepted");

    assert_eq!(
        receipt.eligibility,
        vec![
            EligibilityHint::QualifyingBenefit,
            EligibilityHint::OffGasElectricHeating
        ]
    );
    assert_eq!(receipt.relay_message.as_deref(), Some("Email sent successfully!"));

    let requests = relay.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.access_key, ACCESS_KEY);
    assert_eq!(
        request.subject,
        "Free Heating Control - Application from Ada Lovelace"
    );
    assert_eq!(request.reply_to.as_deref(), Some("ada@example.co.uk"));
    assert!(request
        .message
        .starts_with("FLAGS: On qualifying benefit, Off-gas & electric heating\n"));
    assert!(request.message.ends_with("UA: Mozilla/5.0 test"));

    let wizard = wizard.lock().expect("wizard");
    assert_eq!(wizard.step(), Step::HOUSEHOLD);
    assert_eq!(wizard.answers().first_name, "");
    assert!(backend.raw(DRAFT_STORAGE_KEY).is_none());

    let notices = notices(&events);
    assert_eq!(
        notices.last().map(|n| n.title.as_str()),
        Some("Application submitted!")
    );
    assert!(events
        .lock()
        .expect("events")
        .iter()
        .any(|event| matches!(event, WizardEvent::Submitted)));
}

#[tokio::test]
async fn relay_rejection_keeps_answers_for_retry() {
    let relay = Arc::new(RecordingRelay::new(Reply::Reject("invalid access key")));
    let (mut wizard, backend) = review_wizard(complete_answers());
    let events = record_events(&mut wizard);
    let wizard = Mutex::new(wizard);
    let pipeline = pipeline(relay.clone());

    let err = pipeline
        .submit(&wizard, "")
        .await
        .expect_err("relay said no");
    assert!(matches!(
        err,
        SubmissionError::Relay(RelayError::Rejected(ref message)) if message == "invalid access key"
    ));
    assert!(!pipeline.is_in_flight());

    let guard = wizard.lock().expect("wizard");
    assert_eq!(guard.step(), Step::REVIEW);
    assert_eq!(guard.answers(), &complete_answers());
    assert!(backend.raw(DRAFT_STORAGE_KEY).is_some());
    assert_eq!(
        notices(&events).last().map(|n| n.title.clone()),
        Some("Could not send".to_string())
    );
}

#[tokio::test]
async fn unreachable_relay_is_reported() {
    let relay = Arc::new(RecordingRelay::new(Reply::Unreachable));
    let (wizard, _) = review_wizard(complete_answers());
    let wizard = Mutex::new(wizard);

    let err = pipeline(relay)
        .submit(&wizard, "")
        .await
        .expect_err("transport failure");
    assert!(matches!(err, SubmissionError::Relay(RelayError::Transport(_))));
    assert_eq!(wizard.lock().expect("wizard").step(), Step::REVIEW);
}

#[tokio::test]
async fn submitting_before_the_review_step_is_refused() {
    let relay = Arc::new(RecordingRelay::new(Reply::Accept));
    let (mut wizard, _) = fresh_wizard();
    let contact = complete_answers();
    wizard.update(AnswerPatch {
        first_name: Some(contact.first_name),
        last_name: Some(contact.last_name),
        phone: Some(contact.phone),
        preferred_contact: Some(contact.preferred_contact),
        contact_time: Some(contact.contact_time),
        consent_contact: Some(true),
        consent_privacy: Some(true),
        ..AnswerPatch::default()
    });
    let events = record_events(&mut wizard);
    let wizard = Mutex::new(wizard);

    let err = pipeline(relay.clone())
        .submit(&wizard, "")
        .await
        .expect_err("still on the first step");
    assert!(matches!(
        err,
        SubmissionError::NotOnReview { step } if step == Step::HOUSEHOLD
    ));
    assert!(relay.requests().is_empty());
    assert_eq!(notices(&events)[0].title, "Review your answers");

    let guard = wizard.lock().expect("wizard");
    assert_eq!(guard.step(), Step::HOUSEHOLD);
    assert_eq!(guard.answers().first_name, "Ada");
}

#[tokio::test]
async fn submitting_from_the_contact_step_is_refused() {
    let relay = Arc::new(RecordingRelay::new(Reply::Accept));
    let (wizard, backend) = wizard_with(complete_answers());
    let wizard = Mutex::new(wizard);

    let err = pipeline(relay.clone())
        .submit(&wizard, "")
        .await
        .expect_err("contact step is not the review step");
    assert!(matches!(err, SubmissionError::NotOnReview { step } if step == Step::CONTACT));
    assert!(relay.requests().is_empty());
    assert!(backend.raw(DRAFT_STORAGE_KEY).is_some());
}

#[tokio::test]
async fn filled_honeypot_never_reaches_the_relay() {
    let relay = Arc::new(RecordingRelay::new(Reply::Accept));
    let (mut wizard, _) = review_wizard(complete_answers());
    wizard.set_honeypot("Acme Ltd");
    let events = record_events(&mut wizard);
    let wizard = Mutex::new(wizard);

    let err = pipeline(relay.clone())
        .submit(&wizard, "")
        .await
        .expect_err("spam blocked");
    assert!(matches!(err, SubmissionError::Spam(_)));
    assert!(relay.requests().is_empty());
    assert_eq!(notices(&events)[0].title, "Submission blocked");
}

#[tokio::test]
async fn missing_access_key_never_reaches_the_relay() {
    let relay = Arc::new(RecordingRelay::new(Reply::Accept));
    let (mut wizard, _) = review_wizard(complete_answers());
    let events = record_events(&mut wizard);
    let wizard = Mutex::new(wizard);

    let pipeline = SubmissionPipeline::new(relay.clone(), Some("  ".to_string()));
    assert!(!pipeline.is_configured());
    let err = pipeline
        .submit(&wizard, "")
        .await
        .expect_err("not configured");
    assert!(matches!(err, SubmissionError::NotConfigured));
    assert!(relay.requests().is_empty());
    assert_eq!(notices(&events)[0].title, "Missing API key");
}

#[tokio::test]
async fn invalid_contact_step_blocks_submission() {
    let relay = Arc::new(RecordingRelay::new(Reply::Accept));
    let mut answers = complete_answers();
    answers.consent_privacy = false;
    let (wizard, _) = review_wizard(answers);
    let wizard = Mutex::new(wizard);

    let err = pipeline(relay.clone())
        .submit(&wizard, "")
        .await
        .expect_err("privacy not accepted");
    match err {
        SubmissionError::Validation(rejected) => {
            assert_eq!(rejected.step, Step::CONTACT);
            assert_eq!(rejected.issues[0].field, Field::ConsentPrivacy);
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert!(relay.requests().is_empty());
    assert!(wizard
        .lock()
        .expect("wizard")
        .errors()
        .get(Field::ConsentPrivacy)
        .is_some());
}

#[tokio::test]
async fn second_submit_while_pending_is_rejected() {
    let relay = Arc::new(PendingRelay::default());
    let pipeline = Arc::new(SubmissionPipeline::new(
        relay.clone(),
        Some(ACCESS_KEY.to_string()),
    ));
    let (wizard, _) = review_wizard(complete_answers());
    let wizard = Arc::new(Mutex::new(wizard));

    let first = tokio::spawn({
        let pipeline = pipeline.clone();
        let wizard = wizard.clone();
        async move { pipeline.submit(&wizard, "first").await }
    });
    relay.started.notified().await;
    assert!(pipeline.is_in_flight());

    // The wizard stays editable while the relay call is pending.
    wizard
        .lock()
        .expect("wizard")
        .update(AnswerPatch {
            notes: Some("typed while sending".to_string()),
            ..AnswerPatch::default()
        });

    let err = pipeline
        .submit(&wizard, "second")
        .await
        .expect_err("gate is held");
    assert!(matches!(err, SubmissionError::InFlight));
    assert_eq!(relay.sends(), 1);

    relay.release.notify_one();
    first
        .await
        .expect("task joins")
        .expect("first submission accepted");
    assert!(!pipeline.is_in_flight());
    assert_eq!(relay.sends(), 1);
}

#[tokio::test]
async fn referral_batch_resets_after_acceptance() {
    let relay = Arc::new(RecordingRelay::new(Reply::Accept));
    let pipeline = pipeline(relay.clone());
    let context = SubmissionContext::now("");

    let mut batch = ReferralBatch::default();
    batch.update(0, ReferralField::Name, "Joan Clarke").unwrap();
    batch.update(0, ReferralField::Phone, "07000 000000").unwrap();
    batch.update(0, ReferralField::Address, "3 Mill Lane").unwrap();
    batch.add();
    batch.update(1, ReferralField::Name, "Tommy Flowers").unwrap();
    batch.update(1, ReferralField::Phone, "07111 111111").unwrap();
    batch.update(1, ReferralField::Address, "4 Mill Lane").unwrap();

    pipeline
        .submit_referrals(&mut batch, &context)
        .await
        .expect("referrals accepted");

    assert_eq!(batch, ReferralBatch::default());
    let requests = relay.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].subject,
        "Free Heating Control - Referral Submissions"
    );
    assert!(requests[0].message.contains("Referral 2:\nName: Tommy Flowers\n"));
}

#[tokio::test]
async fn incomplete_referrals_are_not_sent() {
    let relay = Arc::new(RecordingRelay::new(Reply::Accept));
    let pipeline = pipeline(relay.clone());
    let mut batch = ReferralBatch::default();
    batch.update(0, ReferralField::Name, "Joan Clarke").unwrap();

    let err = pipeline
        .submit_referrals(&mut batch, &SubmissionContext::now(""))
        .await
        .expect_err("phone and address missing");
    assert!(matches!(err, ReferralError::Incomplete { .. }));
    assert!(relay.requests().is_empty());
    assert_eq!(batch.entries()[0].name, "Joan Clarke");
}

#[tokio::test]
async fn pending_referrals_do_not_block_other_visitors() {
    let relay = Arc::new(PendingRelay::default());
    let sessions = sessions_with(relay.clone(), Some(ACCESS_KEY));

    let referral = |name: &str| {
        let mut batch = ReferralBatch::default();
        batch.update(0, ReferralField::Name, name).unwrap();
        batch.update(0, ReferralField::Phone, "07000 000000").unwrap();
        batch.update(0, ReferralField::Address, "3 Mill Lane").unwrap();
        batch
    };

    let first = tokio::spawn({
        let sessions = sessions.clone();
        let mut batch = referral("Joan Clarke");
        async move { sessions.submit_referrals(&mut batch, "visitor-a").await }
    });
    relay.started.notified().await;

    let second = tokio::spawn({
        let sessions = sessions.clone();
        let mut batch = referral("Tommy Flowers");
        async move { sessions.submit_referrals(&mut batch, "visitor-b").await }
    });
    relay.started.notified().await;
    assert_eq!(relay.sends(), 2);

    relay.release.notify_waiters();
    first
        .await
        .expect("task joins")
        .expect("first visitor's referral accepted");
    second
        .await
        .expect("task joins")
        .expect("second visitor's referral accepted");
}

#[tokio::test]
async fn sessions_with_a_pending_submission_are_not_evicted() {
    let relay = Arc::new(PendingRelay::default());
    let drafts = Arc::new(MemoryDraftFactory::default());
    let id = SessionId::generate();
    drafts
        .store_for(&id)
        .save(&complete_answers(), Step::REVIEW)
        .expect("seed draft");
    let sessions = Arc::new(
        IntakeSessions::new(drafts, relay.clone(), Some(ACCESS_KEY.to_string()))
            .with_idle_ttl(Duration::ZERO),
    );
    let session = sessions.open(Some(id), Provenance::default());

    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.submit("pending").await }
    });
    relay.started.notified().await;

    assert_eq!(sessions.evict_idle(), 0);
    assert!(sessions.get(&id).is_ok());

    relay.release.notify_one();
    pending
        .await
        .expect("task joins")
        .expect("submission accepted");
    assert_eq!(sessions.evict_idle(), 1);
}
