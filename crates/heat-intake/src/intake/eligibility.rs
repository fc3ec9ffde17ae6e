use std::fmt;

use serde::{Serialize, Serializer};

use super::domain::{AnswerSet, BoilerAge, GasSupply};

/// Benefits that count towards the scheme's household eligibility route.
pub const QUALIFYING_BENEFITS: [&str; 9] = [
    "Universal Credit",
    "Pension Credit (Guarantee Credit)",
    "Income-based JSA",
    "Income-related ESA",
    "Income Support",
    "Working Tax Credit",
    "Child Tax Credit",
    "Housing Benefit",
    "Child Benefit (income thresholds apply)",
];

/// Advisory signal derived from the answers. Never a qualification decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EligibilityHint {
    QualifyingBenefit,
    OffGasElectricHeating,
    OlderBoiler,
    LowEpc,
    NoKeyFlags,
}

impl EligibilityHint {
    pub fn label(self) -> &'static str {
        match self {
            Self::QualifyingBenefit => "On qualifying benefit",
            Self::OffGasElectricHeating => "Off-gas & electric heating",
            Self::OlderBoiler => "Boiler 13+ years",
            Self::LowEpc => "EPC E/F/G",
            Self::NoKeyFlags => "No key flags",
        }
    }
}

impl fmt::Display for EligibilityHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for EligibilityHint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Every matching hint in priority order, or the single `NoKeyFlags` sentinel.
pub fn evaluate(answers: &AnswerSet) -> Vec<EligibilityHint> {
    let mut hints = Vec::new();

    if answers
        .benefits
        .iter()
        .any(|benefit| QUALIFYING_BENEFITS.contains(&benefit.as_str()))
    {
        hints.push(EligibilityHint::QualifyingBenefit);
    }

    let off_gas = answers.has_gas == Some(GasSupply::No);
    let electric = answers
        .current_heating
        .is_some_and(|heating| heating.is_electric_or_none());
    if off_gas && electric {
        hints.push(EligibilityHint::OffGasElectricHeating);
    }

    if answers.boiler_age == Some(BoilerAge::OLDEST) {
        hints.push(EligibilityHint::OlderBoiler);
    }

    if answers.epc_rating.is_low() {
        hints.push(EligibilityHint::LowEpc);
    }

    if hints.is_empty() {
        hints.push(EligibilityHint::NoKeyFlags);
    }
    hints
}

/// Hints as one comma-separated line, the form used in the review and the message body.
pub fn summary_line(hints: &[EligibilityHint]) -> String {
    hints
        .iter()
        .map(|hint| hint.label())
        .collect::<Vec<_>>()
        .join(", ")
}
