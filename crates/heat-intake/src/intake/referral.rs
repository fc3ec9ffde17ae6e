use serde::{Deserialize, Serialize};

use super::submission::payload::{RelayRequest, SubmissionContext};
use super::submission::relay::RelayError;

/// In-page anchor of the referral form.
pub const REFERRAL_ANCHOR: &str = "referral-form";

const REFERRAL_SUBJECT: &str = "Free Heating Control - Referral Submissions";
const REFERRAL_SENDER: &str = "Referral Form";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferralEntry {
    pub name: String,
    pub phone: String,
    pub address: String,
    /// Free text; blank means the referrer did not know.
    pub benefits: String,
}

impl ReferralEntry {
    fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.phone.trim().is_empty()
            && !self.address.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralField {
    Name,
    Phone,
    Address,
    Benefits,
}

#[derive(Debug, thiserror::Error)]
pub enum ReferralError {
    #[error("Name, phone number, and address are required for each referral.")]
    Incomplete { entries: Vec<usize> },
    #[error("a referral batch needs at least one entry")]
    LastEntry,
    #[error("referral {index} does not exist")]
    UnknownEntry { index: usize },
    #[error("relay access key is not configured")]
    NotConfigured,
    #[error("a submission is already in progress")]
    InFlight,
    #[error(transparent)]
    Relay(#[from] RelayError),
}

/// One or more people referred by a visitor. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ReferralEntry>", into = "Vec<ReferralEntry>")]
pub struct ReferralBatch {
    entries: Vec<ReferralEntry>,
}

impl Default for ReferralBatch {
    fn default() -> Self {
        Self {
            entries: vec![ReferralEntry::default()],
        }
    }
}

impl TryFrom<Vec<ReferralEntry>> for ReferralBatch {
    type Error = ReferralError;

    fn try_from(entries: Vec<ReferralEntry>) -> Result<Self, Self::Error> {
        if entries.is_empty() {
            return Err(ReferralError::LastEntry);
        }
        Ok(Self { entries })
    }
}

impl From<ReferralBatch> for Vec<ReferralEntry> {
    fn from(batch: ReferralBatch) -> Self {
        batch.entries
    }
}

impl ReferralBatch {
    pub fn entries(&self) -> &[ReferralEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add(&mut self) -> usize {
        self.entries.push(ReferralEntry::default());
        self.entries.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Result<ReferralEntry, ReferralError> {
        if index >= self.entries.len() {
            return Err(ReferralError::UnknownEntry { index });
        }
        if self.entries.len() == 1 {
            return Err(ReferralError::LastEntry);
        }
        Ok(self.entries.remove(index))
    }

    pub fn update(
        &mut self,
        index: usize,
        field: ReferralField,
        value: impl Into<String>,
    ) -> Result<(), ReferralError> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(ReferralError::UnknownEntry { index })?;
        let slot = match field {
            ReferralField::Name => &mut entry.name,
            ReferralField::Phone => &mut entry.phone,
            ReferralField::Address => &mut entry.address,
            ReferralField::Benefits => &mut entry.benefits,
        };
        *slot = value.into();
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ReferralError> {
        let entries: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.is_complete())
            .map(|(index, _)| index)
            .collect();
        if entries.is_empty() {
            Ok(())
        } else {
            Err(ReferralError::Incomplete { entries })
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

pub fn compose_referral_message(batch: &ReferralBatch, context: &SubmissionContext) -> String {
    let mut lines = vec![REFERRAL_SUBJECT.to_string(), String::new(), "REFERRALS:".to_string()];
    for (index, entry) in batch.entries().iter().enumerate() {
        let benefits = if entry.benefits.trim().is_empty() {
            "Not specified"
        } else {
            entry.benefits.trim()
        };
        lines.extend([
            String::new(),
            format!("Referral {}:", index + 1),
            format!("Name: {}", entry.name.trim()),
            format!("Phone: {}", entry.phone.trim()),
            format!("Address: {}", entry.address.trim()),
            format!("Benefits: {benefits}"),
        ]);
    }
    lines.push(String::new());
    lines.push(format!("Submitted: {}", context.timestamp()));
    lines.join("\n")
}

impl RelayRequest {
    pub fn referrals(access_key: &str, batch: &ReferralBatch, context: &SubmissionContext) -> Self {
        Self {
            access_key: access_key.to_string(),
            subject: REFERRAL_SUBJECT.to_string(),
            from_name: REFERRAL_SENDER.to_string(),
            reply_to: None,
            message: compose_referral_message(batch, context),
            company: String::new(),
        }
    }
}
