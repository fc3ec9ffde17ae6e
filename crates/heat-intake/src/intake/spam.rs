/// Name of the hidden form input bots tend to fill.
pub const HONEYPOT_FIELD: &str = "company";

/// Best-effort bot deterrent: the hidden field must stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Honeypot {
    value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("submission blocked")]
pub struct SpamRejected;

impl Honeypot {
    pub fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn clear(&mut self) {
        self.value.clear();
    }

    pub fn check(&self) -> Result<(), SpamRejected> {
        if self.value.is_empty() {
            Ok(())
        } else {
            Err(SpamRejected)
        }
    }
}
