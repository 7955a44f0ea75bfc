use super::money::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContributionId(pub String);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ContributionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for MemberId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for ContributionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// What the caller asks for when contributing to a group.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub group_id: GroupId,
    pub member_id: MemberId,
    /// Address the gateway sends its receipt to.
    pub email: String,
    pub amount: Amount,
}

/// Returned by the remote "initiate payment" call.
///
/// Lives only for the duration of one payment attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiation {
    pub contribution_id: ContributionId,
    /// Access code handed to the gateway's charge flow.
    pub authorization_handle: String,
    pub reference: String,
    pub amount: Amount,
    pub group_id: GroupId,
    pub group_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationStatus {
    Pending,
    Success,
    Failed,
}

/// The server's authoritative judgment on a contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentVerification {
    pub contribution_id: ContributionId,
    pub status: VerificationStatus,
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PaymentVerification {
    pub fn is_settled(&self) -> bool {
        self.status == VerificationStatus::Success
    }

    pub fn is_declined(&self) -> bool {
        self.status == VerificationStatus::Failed
    }
}

/// A single charge attempt handed to the card gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub email: String,
    /// Amount in the currency's minor unit (kobo).
    pub amount_minor: i64,
    pub access_code: String,
}

/// Terminal outcome of the gateway's charge flow.
///
/// `Success` only means the charge dialog completed. It is not proof that funds settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    Success(String),
    Error(String),
    Cancelled,
}
