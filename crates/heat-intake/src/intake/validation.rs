//! Field rules and per-step validators.
//!
//! Rules are pure: they read an [`AnswerSet`] and report issues, never touching
//! the wizard's error map. The wizard decides what to do with the report.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::domain::{AnswerSet, Field, Step};

static POSTCODE_PARTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z]{1,2}[0-9][A-Z0-9]?)([0-9][A-Z]{2})$").expect("postcode split pattern")
});

static POSTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(GIR 0AA|[A-Z]{1,2}[0-9][A-Z0-9]? [0-9][ABD-HJLN-UW-Z]{2})$")
        .expect("postcode pattern")
});

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\+44|0)[0-9]{9,10}$").expect("phone pattern"));

static EMAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r".+@.+\..+").expect("email pattern"));

/// Upper-case, drop whitespace, then put a single space before the inward code
/// when the remainder splits cleanly into outward + inward parts.
pub fn normalize_postcode(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    if compact == "GIR0AA" {
        return "GIR 0AA".to_string();
    }

    match POSTCODE_PARTS.captures(&compact) {
        Some(parts) => format!("{} {}", &parts[1], &parts[2]),
        None => compact,
    }
}

pub fn is_valid_postcode(raw: &str) -> bool {
    POSTCODE.is_match(&normalize_postcode(raw))
}

pub fn is_valid_phone(raw: &str) -> bool {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    PHONE.is_match(&compact)
}

/// Loose shape check; an empty address is fine because email is optional.
pub fn is_valid_email(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || EMAIL.is_match(trimmed)
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// One failing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: Field,
    pub message: &'static str,
}

/// Outcome of validating a single step. Issues are in form order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepValidation {
    pub step: Step,
    pub issues: Vec<FieldIssue>,
}

impl StepValidation {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn first_message(&self) -> Option<&'static str> {
        self.issues.first().map(|issue| issue.message)
    }
}

pub fn validate_step(answers: &AnswerSet, step: Step) -> StepValidation {
    let mut issues = Vec::new();
    let mut fail = |field: Field, message: &'static str| issues.push(FieldIssue { field, message });

    match step {
        Step::HOUSEHOLD => {
            if answers.property_relationship.is_none() {
                fail(
                    Field::PropertyRelationship,
                    "Please select your relationship to the property.",
                );
            }
            if answers.benefits.is_empty() {
                fail(
                    Field::Benefits,
                    "Please select at least one benefit (required).",
                );
            }
        }
        Step::PROPERTY => {
            if !is_valid_postcode(&answers.postcode) {
                fail(Field::Postcode, "Enter a valid UK postcode (e.g., SW1A 1AA).");
            }
            if is_blank(&answers.address) {
                fail(Field::Address, "Please enter your full address.");
            }
            if answers.has_gas.is_none() {
                fail(Field::HasGas, "Please select mains gas availability.");
            }
            if answers.current_heating.is_none() {
                fail(
                    Field::CurrentHeating,
                    "Please select your current heating type.",
                );
            }
        }
        Step::CONTACT => {
            if is_blank(&answers.first_name) {
                fail(Field::FirstName, "First name is required.");
            }
            if is_blank(&answers.last_name) {
                fail(Field::LastName, "Last name is required.");
            }
            if !is_valid_email(&answers.email) {
                fail(
                    Field::Email,
                    "Please enter a valid email address or leave it blank.",
                );
            }
            if !is_valid_phone(&answers.phone) {
                fail(Field::Phone, "Enter a valid UK phone number (07… or +44…).");
            }
            if answers.preferred_contact.is_none() {
                fail(
                    Field::PreferredContact,
                    "Please choose your preferred contact method.",
                );
            }
            if answers.contact_time.is_none() {
                fail(
                    Field::ContactTime,
                    "Please choose the best time to contact you.",
                );
            }
            if !answers.consent_contact {
                fail(
                    Field::ConsentContact,
                    "Please consent to being contacted to proceed.",
                );
            }
            if !answers.consent_privacy {
                fail(
                    Field::ConsentPrivacy,
                    "Please accept the Privacy Notice to proceed.",
                );
            }
        }
        _ => {}
    }

    StepValidation { step, issues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::domain::{
        ContactMethod, ContactTime, GasSupply, HeatingType, PropertyRelationship,
    };

    #[test]
    fn normalizes_compact_lowercase_postcode() {
        assert_eq!(normalize_postcode("sw1a1aa"), "SW1A 1AA");
        assert!(is_valid_postcode("sw1a1aa"));
        assert_eq!(normalize_postcode("  m1   1ae "), "M1 1AE");
        assert_eq!(normalize_postcode("gir 0aa"), "GIR 0AA");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in [
            "sw1a1aa",
            "SW1A 1AA",
            "b33 8th",
            "cr2 6xh",
            "dn55 1pt",
            "not a postcode",
            "",
            "ec1a1bb extra",
            "gir0aa",
        ] {
            let once = normalize_postcode(raw);
            assert_eq!(normalize_postcode(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn leaves_unsplittable_input_compacted() {
        assert_eq!(normalize_postcode("12 345"), "12345");
        assert!(!is_valid_postcode("12345"));
        assert!(!is_valid_postcode(""));
    }

    #[test]
    fn rejects_forbidden_inward_letters() {
        assert!(!is_valid_postcode("SW1A 1AC"));
        assert!(is_valid_postcode("W1A 0AX"));
    }

    #[test]
    fn phone_shapes() {
        assert!(is_valid_phone("07123456789"));
        assert!(is_valid_phone("+441234567890"));
        assert!(is_valid_phone("0712 345 6789"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("+4412345"));
        assert!(!is_valid_phone(""));
    }

    #[test]
    fn email_is_optional_but_shaped() {
        assert!(is_valid_email(""));
        assert!(is_valid_email("   "));
        assert!(is_valid_email("ada@example.co.uk"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada.example.com"));
    }

    #[test]
    fn empty_answers_fail_every_input_step() {
        let answers = AnswerSet::default();
        for step in [Step::HOUSEHOLD, Step::PROPERTY, Step::CONTACT] {
            let report = validate_step(&answers, step);
            assert!(!report.is_valid(), "step {step} should fail");
            assert!(report.first_message().is_some());
        }
        assert!(validate_step(&answers, Step::REVIEW).is_valid());
    }

    #[test]
    fn household_counts_are_optional() {
        let mut answers = AnswerSet {
            property_relationship: Some(PropertyRelationship::Tenant),
            ..AnswerSet::default()
        };
        answers.benefits.insert("Universal Credit".to_string());

        assert!(validate_step(&answers, Step::HOUSEHOLD).is_valid());
    }

    #[test]
    fn reports_issues_in_form_order() {
        let answers = AnswerSet {
            has_gas: Some(GasSupply::Yes),
            ..AnswerSet::default()
        };
        let report = validate_step(&answers, Step::PROPERTY);
        let fields: Vec<Field> = report.issues.iter().map(|issue| issue.field).collect();
        assert_eq!(
            fields,
            vec![Field::Postcode, Field::Address, Field::CurrentHeating]
        );
        assert_eq!(
            report.first_message(),
            Some("Enter a valid UK postcode (e.g., SW1A 1AA).")
        );
    }

    #[test]
    fn contact_step_requires_both_consents() {
        let answers = AnswerSet {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: "07123456789".to_string(),
            preferred_contact: Some(ContactMethod::Phone),
            contact_time: Some(ContactTime::Morning),
            consent_contact: true,
            current_heating: Some(HeatingType::Oil),
            ..AnswerSet::default()
        };
        let report = validate_step(&answers, Step::CONTACT);
        assert_eq!(
            report.issues,
            vec![FieldIssue {
                field: Field::ConsentPrivacy,
                message: "Please accept the Privacy Notice to proceed.",
            }]
        );
    }
}
