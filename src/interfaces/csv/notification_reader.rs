use crate::domain::ledger::ContributionRecord;
use crate::domain::money::Amount;
use crate::domain::payment::{
    ContributionId, GroupId, MemberId, PaymentVerification, VerificationStatus,
};
use crate::error::{PaymentError, Result};
use serde::{Deserialize, Deserializer};
use std::io::Read;

/// One payment notification, as exported from push deliveries.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Notification {
    pub contribution: ContributionId,
    pub group: GroupId,
    pub member: MemberId,
    #[serde(deserialize_with = "deserialize_status")]
    pub status: VerificationStatus,
    pub amount: Amount,
    pub reference: Option<String>,
}

fn deserialize_status<'de, D>(deserializer: D) -> std::result::Result<VerificationStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.to_ascii_uppercase().as_str() {
        "PENDING" => Ok(VerificationStatus::Pending),
        "SUCCESS" => Ok(VerificationStatus::Success),
        "FAILED" => Ok(VerificationStatus::Failed),
        other => Err(serde::de::Error::custom(format!(
            "unknown verification status: {}",
            other
        ))),
    }
}

impl Notification {
    /// The pending contribution this notification refers to.
    pub fn contribution_record(&self) -> ContributionRecord {
        ContributionRecord::pending(
            self.contribution.clone(),
            self.group.clone(),
            self.member.clone(),
            self.amount,
            self.reference.clone().unwrap_or_default(),
        )
    }

    pub fn verification(&self) -> PaymentVerification {
        PaymentVerification {
            contribution_id: self.contribution.clone(),
            status: self.status,
            amount: self.amount,
            paid_at: None,
            gateway_reference: self.reference.clone(),
            message: None,
        }
    }
}

/// Reads payment notifications from a CSV source.
///
/// Wraps `csv::Reader` and yields `Result<Notification>` lazily, trimming whitespace
/// and tolerating ragged rows.
pub struct NotificationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> NotificationReader<R> {
    /// Creates a new `NotificationReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes notifications.
    pub fn notifications(self) -> impl Iterator<Item = Result<Notification>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}
