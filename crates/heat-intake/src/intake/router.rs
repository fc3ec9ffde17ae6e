use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::AnswerPatch;
use super::events::{Notice, WizardSnapshot};
use super::referral::{ReferralBatch, ReferralError};
use super::session::{IntakeSession, IntakeSessions, SessionId};
use super::submission::payload::Provenance;
use super::submission::pipeline::SubmissionError;

/// Router builder exposing the wizard, submission, and referral endpoints.
pub fn intake_router(sessions: Arc<IntakeSessions>) -> Router {
    Router::new()
        .route("/api/v1/intake/sessions", post(open_handler))
        .route("/api/v1/intake/sessions/:session_id", get(snapshot_handler))
        .route(
            "/api/v1/intake/sessions/:session_id/answers",
            patch(answers_handler),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/postcode/normalize",
            post(normalize_handler),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/honeypot",
            put(honeypot_handler),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/advance",
            post(advance_handler),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/retreat",
            post(retreat_handler),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/reset",
            post(reset_handler),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/review",
            get(review_handler),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/submit",
            post(submit_handler),
        )
        .route("/api/v1/referrals", post(referrals_handler))
        .with_state(sessions)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OpenSessionRequest {
    /// Decoded landing-page query parameters.
    pub query: BTreeMap<String, String>,
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Deserialize)]
pub struct HoneypotUpdate {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct ReferralSubmission {
    pub referrals: ReferralBatch,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionView {
    session_id: SessionId,
    submitting: bool,
    #[serde(flatten)]
    snapshot: WizardSnapshot,
}

fn view(session: &IntakeSession) -> SessionView {
    SessionView {
        session_id: session.id(),
        submitting: session.is_submitting(),
        snapshot: session.snapshot(),
    }
}

fn error_response(status: StatusCode, error: impl ToString, notice: Option<Notice>) -> Response {
    let payload = match notice {
        Some(notice) => json!({ "error": error.to_string(), "notice": notice }),
        None => json!({ "error": error.to_string() }),
    };
    (status, axum::Json(payload)).into_response()
}

fn find(sessions: &IntakeSessions, raw: &str) -> Result<Arc<IntakeSession>, Response> {
    raw.parse::<SessionId>()
        .and_then(|id| sessions.get(&id))
        .map_err(|err| error_response(StatusCode::NOT_FOUND, err, None))
}

fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

pub(crate) async fn open_handler(
    State(sessions): State<Arc<IntakeSessions>>,
    axum::Json(request): axum::Json<OpenSessionRequest>,
) -> Response {
    let provenance = Provenance::from_query(request.query);
    let session = sessions.open(request.session_id, provenance);
    (StatusCode::CREATED, axum::Json(view(&session))).into_response()
}

pub(crate) async fn snapshot_handler(
    State(sessions): State<Arc<IntakeSessions>>,
    Path(session_id): Path<String>,
) -> Response {
    match find(&sessions, &session_id) {
        Ok(session) => (StatusCode::OK, axum::Json(view(&session))).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn answers_handler(
    State(sessions): State<Arc<IntakeSessions>>,
    Path(session_id): Path<String>,
    axum::Json(patch): axum::Json<AnswerPatch>,
) -> Response {
    let session = match find(&sessions, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    session.with_wizard(|wizard| wizard.update(patch));
    (StatusCode::OK, axum::Json(view(&session))).into_response()
}

pub(crate) async fn normalize_handler(
    State(sessions): State<Arc<IntakeSessions>>,
    Path(session_id): Path<String>,
) -> Response {
    let session = match find(&sessions, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    session.with_wizard(|wizard| wizard.normalize_postcode());
    (StatusCode::OK, axum::Json(view(&session))).into_response()
}

pub(crate) async fn honeypot_handler(
    State(sessions): State<Arc<IntakeSessions>>,
    Path(session_id): Path<String>,
    axum::Json(update): axum::Json<HoneypotUpdate>,
) -> Response {
    let session = match find(&sessions, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    session.with_wizard(|wizard| wizard.set_honeypot(update.value));
    StatusCode::NO_CONTENT.into_response()
}

pub(crate) async fn advance_handler(
    State(sessions): State<Arc<IntakeSessions>>,
    Path(session_id): Path<String>,
) -> Response {
    let session = match find(&sessions, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    match session.with_wizard(|wizard| wizard.advance()) {
        Ok(_) => (StatusCode::OK, axum::Json(view(&session))).into_response(),
        Err(rejected) => {
            let payload = json!({
                "error": rejected.to_string(),
                "notice": Notice::fix_fields(rejected.first_message()),
                "issues": rejected.issues,
                "session": view(&session),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn retreat_handler(
    State(sessions): State<Arc<IntakeSessions>>,
    Path(session_id): Path<String>,
) -> Response {
    let session = match find(&sessions, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    session.with_wizard(|wizard| wizard.retreat());
    (StatusCode::OK, axum::Json(view(&session))).into_response()
}

pub(crate) async fn reset_handler(
    State(sessions): State<Arc<IntakeSessions>>,
    Path(session_id): Path<String>,
) -> Response {
    let session = match find(&sessions, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    session.with_wizard(|wizard| wizard.reset());
    (StatusCode::OK, axum::Json(view(&session))).into_response()
}

pub(crate) async fn review_handler(
    State(sessions): State<Arc<IntakeSessions>>,
    Path(session_id): Path<String>,
) -> Response {
    match find(&sessions, &session_id) {
        Ok(session) => {
            let review = session.with_wizard(|wizard| wizard.review());
            (StatusCode::OK, axum::Json(review)).into_response()
        }
        Err(response) => response,
    }
}

pub(crate) async fn submit_handler(
    State(sessions): State<Arc<IntakeSessions>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let session = match find(&sessions, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match session.submit(user_agent(&headers)).await {
        Ok(receipt) => {
            sessions.release(&session.id());
            let payload = json!({
                "receipt": receipt,
                "notice": Notice::submitted(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(SubmissionError::Validation(rejected)) => {
            let payload = json!({
                "error": rejected.to_string(),
                "notice": Notice::fix_fields(rejected.first_message()),
                "issues": rejected.issues,
                "session": view(&session),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(err @ SubmissionError::Spam(_)) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            err,
            Some(Notice::spam_blocked()),
        ),
        Err(err @ SubmissionError::InFlight) => {
            error_response(StatusCode::CONFLICT, err, Some(Notice::in_flight()))
        }
        Err(err @ SubmissionError::NotOnReview { .. }) => {
            error_response(StatusCode::CONFLICT, err, Some(Notice::review_first()))
        }
        Err(err @ SubmissionError::NotConfigured) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            err,
            Some(Notice::not_configured()),
        ),
        Err(err @ SubmissionError::Relay(_)) => {
            error_response(StatusCode::BAD_GATEWAY, err, Some(Notice::send_failed()))
        }
    }
}

pub(crate) async fn referrals_handler(
    State(sessions): State<Arc<IntakeSessions>>,
    headers: HeaderMap,
    axum::Json(submission): axum::Json<ReferralSubmission>,
) -> Response {
    let mut batch = submission.referrals;
    match sessions.submit_referrals(&mut batch, user_agent(&headers)).await {
        Ok(_) => {
            let payload = json!({
                "notice": Notice::referrals_submitted(),
                "referrals": batch,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(ReferralError::Incomplete { entries }) => {
            let payload = json!({
                "error": "Name, phone number, and address are required for each referral.",
                "notice": Notice::referrals_incomplete(),
                "incomplete": entries,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(err @ (ReferralError::LastEntry | ReferralError::UnknownEntry { .. })) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, err, None)
        }
        Err(err @ ReferralError::InFlight) => {
            error_response(StatusCode::CONFLICT, err, Some(Notice::in_flight()))
        }
        Err(err @ ReferralError::NotConfigured) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            err,
            Some(Notice::not_configured()),
        ),
        Err(err @ ReferralError::Relay(_)) => error_response(
            StatusCode::BAD_GATEWAY,
            err,
            Some(Notice::referrals_failed()),
        ),
    }
}
