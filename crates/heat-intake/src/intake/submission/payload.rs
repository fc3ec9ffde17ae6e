use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::intake::domain::AnswerSet;
use crate::intake::eligibility::{summary_line, EligibilityHint};
use crate::intake::review::{benefits_line, or_blank};
use crate::intake::validation::normalize_postcode;

const APPLICATION_SUBJECT: &str = "Free Heating Control - Application from";
const FALLBACK_SENDER: &str = "ECO4 Application";

/// Attribution parameters read once from the landing URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Provenance {
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    #[serde(rename = "ref")]
    pub referrer: String,
}

impl Provenance {
    /// Picks the known keys out of decoded query pairs; unknown keys are ignored
    /// and the first occurrence of a key wins.
    pub fn from_query<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut provenance = Provenance::default();
        let mut seen = [false; 4];
        for (key, value) in pairs {
            let (slot, target) = match key.as_ref() {
                "utm_source" => (0, &mut provenance.utm_source),
                "utm_medium" => (1, &mut provenance.utm_medium),
                "utm_campaign" => (2, &mut provenance.utm_campaign),
                "ref" => (3, &mut provenance.referrer),
                _ => continue,
            };
            if !seen[slot] {
                *target = value.into();
                seen[slot] = true;
            }
        }
        provenance
    }
}

/// Per-attempt request details that are not part of the answers.
#[derive(Debug, Clone)]
pub struct SubmissionContext {
    pub submitted_at: DateTime<Local>,
    pub user_agent: String,
}

impl SubmissionContext {
    pub fn now(user_agent: impl Into<String>) -> Self {
        Self {
            submitted_at: Local::now(),
            user_agent: user_agent.into(),
        }
    }

    pub fn timestamp(&self) -> String {
        self.submitted_at.format("%d/%m/%Y, %H:%M:%S").to_string()
    }
}

/// JSON body accepted by the mail relay.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct RelayRequest {
    pub access_key: String,
    pub subject: String,
    pub from_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub message: String,
    /// Raw honeypot value, forwarded so the relay can apply its own filter.
    pub company: String,
}

impl std::fmt::Debug for RelayRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayRequest")
            .field("subject", &self.subject)
            .field("from_name", &self.from_name)
            .field("reply_to", &self.reply_to)
            .field("message_len", &self.message.len())
            .finish_non_exhaustive()
    }
}

impl RelayRequest {
    pub fn application(
        access_key: &str,
        answers: &AnswerSet,
        hints: &[EligibilityHint],
        provenance: &Provenance,
        context: &SubmissionContext,
        honeypot: &str,
    ) -> Self {
        let full_name = answers.full_name();
        let sender = full_name.trim();
        let email = answers.email.trim();

        Self {
            access_key: access_key.to_string(),
            subject: format!("{APPLICATION_SUBJECT} {full_name}"),
            from_name: if sender.is_empty() {
                FALLBACK_SENDER.to_string()
            } else {
                sender.to_string()
            },
            reply_to: (!email.is_empty()).then(|| email.to_string()),
            message: compose_application_message(answers, hints, provenance, context),
            company: honeypot.to_string(),
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// Fixed human-readable dump of the answers for the back office inbox.
pub fn compose_application_message(
    answers: &AnswerSet,
    hints: &[EligibilityHint],
    provenance: &Provenance,
    context: &SubmissionContext,
) -> String {
    let label = |value: Option<&'static str>| value.unwrap_or("");
    let notes = if answers.notes.is_empty() {
        "(none)"
    } else {
        answers.notes.as_str()
    };

    let lines = [
        format!("FLAGS: {}", summary_line(hints)),
        format!(
            "Source: {}/{} {} Ref:{}",
            provenance.utm_source,
            provenance.utm_medium,
            provenance.utm_campaign,
            provenance.referrer
        ),
        String::new(),
        "STEP 1 - ABOUT YOU".to_string(),
        format!(
            "Relationship: {}",
            label(answers.property_relationship.map(|v| v.as_str()))
        ),
        format!("Benefits: {}", benefits_line(answers)),
        format!("Adults: {}", or_blank(&answers.adults)),
        format!("Children: {}", or_blank(&answers.children)),
        String::new(),
        "STEP 2 - PROPERTY".to_string(),
        format!("Postcode: {}", normalize_postcode(&answers.postcode)),
        format!("Address: {}", answers.address),
        format!("Mains Gas: {}", label(answers.has_gas.map(|v| v.as_str()))),
        format!(
            "Current Heating: {}",
            label(answers.current_heating.map(|v| v.as_str()))
        ),
        format!(
            "Boiler Age: {}",
            answers.boiler_age.map(|v| v.as_str()).unwrap_or("—")
        ),
        format!("EPC Rating: {}", answers.epc_rating.as_str()),
        format!(
            "Property Type: {}",
            answers.property_type.map(|v| v.as_str()).unwrap_or("—")
        ),
        String::new(),
        "STEP 3 - CONTACT".to_string(),
        format!("Name: {}", answers.full_name()),
        format!("Email: {}", or_blank(&answers.email)),
        format!("Phone: {}", answers.phone),
        format!(
            "Preferred Contact: {}",
            label(answers.preferred_contact.map(|v| v.as_str()))
        ),
        format!(
            "Best Time: {}",
            label(answers.contact_time.map(|v| v.as_str()))
        ),
        format!("GDPR Contact Consent: {}", yes_no(answers.consent_contact)),
        format!("Privacy Accepted: {}", yes_no(answers.consent_privacy)),
        format!("Marketing Opt-in: {}", yes_no(answers.marketing_opt_in)),
        String::new(),
        "NOTES".to_string(),
        notes.to_string(),
        String::new(),
        format!("Submitted: {}", context.timestamp()),
        format!("UA: {}", context.user_agent),
    ];
    lines.join("\n")
}
