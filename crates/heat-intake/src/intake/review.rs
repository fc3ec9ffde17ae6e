use serde::Serialize;

use super::domain::AnswerSet;
use super::eligibility::{evaluate, summary_line};
use super::validation::normalize_postcode;

const BLANK: &str = "—";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewRow {
    pub label: &'static str,
    pub value: String,
    pub multiline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewSection {
    pub title: &'static str,
    pub rows: Vec<ReviewRow>,
}

/// Read-only rendering of the final step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewSummary {
    pub sections: Vec<ReviewSection>,
    /// Advisory only; must not be presented as a qualification decision.
    pub eligibility: String,
}

impl ReviewSummary {
    pub fn from_answers(answers: &AnswerSet) -> Self {
        let sections = vec![
            ReviewSection {
                title: "About you",
                rows: vec![
                    row(
                        "Relationship",
                        opt(answers.property_relationship.map(|v| v.as_str())),
                    ),
                    row("Benefits", benefits_line(answers)),
                    row(
                        "Adults / Children",
                        format!(
                            "{} / {}",
                            or_blank(&answers.adults),
                            or_blank(&answers.children)
                        ),
                    ),
                ],
            },
            ReviewSection {
                title: "Property",
                rows: vec![
                    row("Postcode", normalize_postcode(&answers.postcode)),
                    multiline("Address", answers.address.clone()),
                    row("Mains Gas", opt(answers.has_gas.map(|v| v.as_str()))),
                    row("Heating", opt(answers.current_heating.map(|v| v.as_str()))),
                    row("Boiler Age", opt(answers.boiler_age.map(|v| v.as_str()))),
                    row("EPC", answers.epc_rating.as_str().to_string()),
                    row(
                        "Property Type",
                        opt(answers.property_type.map(|v| v.as_str())),
                    ),
                ],
            },
            ReviewSection {
                title: "Contact",
                rows: contact_rows(answers),
            },
        ];

        Self {
            sections,
            eligibility: summary_line(&evaluate(answers)),
        }
    }

    pub fn value_of(&self, label: &str) -> Option<&str> {
        self.sections
            .iter()
            .flat_map(|section| section.rows.iter())
            .find(|row| row.label == label)
            .map(|row| row.value.as_str())
    }
}

fn contact_rows(answers: &AnswerSet) -> Vec<ReviewRow> {
    let mut rows = vec![
        row("Name", answers.full_name()),
        row("Email", or_blank(&answers.email).to_string()),
        row("Phone", answers.phone.clone()),
        row(
            "Contact",
            format!(
                "{}, {}",
                answers.preferred_contact.map(|v| v.as_str()).unwrap_or(""),
                answers.contact_time.map(|v| v.as_str()).unwrap_or("")
            ),
        ),
    ];
    if !answers.notes.is_empty() {
        rows.push(multiline("Notes", answers.notes.clone()));
    }
    rows
}

pub(crate) fn benefits_line(answers: &AnswerSet) -> String {
    if answers.benefits.is_empty() {
        "None".to_string()
    } else {
        answers
            .benefits
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub(crate) fn or_blank(value: &str) -> &str {
    if value.is_empty() {
        BLANK
    } else {
        value
    }
}

fn opt(value: Option<&'static str>) -> String {
    value.unwrap_or(BLANK).to_string()
}

fn row(label: &'static str, value: String) -> ReviewRow {
    ReviewRow {
        label,
        value,
        multiline: false,
    }
}

fn multiline(label: &'static str, value: String) -> ReviewRow {
    ReviewRow {
        label,
        value,
        multiline: true,
    }
}
