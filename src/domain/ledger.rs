use super::money::{Amount, Balance};
use super::payment::{ContributionId, GroupId, MemberId, PaymentVerification};
use crate::error::PaymentError;
use serde::{Deserialize, Serialize};

/// Cached view of a funding group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: GroupId,
    pub name: String,
    /// Funding target, if the group has one.
    pub target: Option<Balance>,
    /// Sum of every settled contribution.
    pub collected: Balance,
    /// Number of settled contributions.
    pub contributors: u32,
}

impl GroupRecord {
    pub fn new(id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            target: None,
            collected: Balance::ZERO,
            contributors: 0,
        }
    }

    pub fn with_target(mut self, target: Balance) -> Self {
        self.target = Some(target);
        self
    }

    pub fn credit(&mut self, amount: Amount) {
        self.collected += amount.into();
        self.contributors += 1;
    }

    pub fn is_funded(&self) -> bool {
        self.target.is_some_and(|target| self.collected >= target)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    #[default]
    Pending,
    Paid,
}

/// Cached membership of one user in one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub group_id: GroupId,
    pub member_id: MemberId,
    pub status: MemberStatus,
    pub paid_amount: Balance,
}

impl MemberRecord {
    pub fn new(group_id: GroupId, member_id: MemberId) -> Self {
        Self {
            group_id,
            member_id,
            status: MemberStatus::Pending,
            paid_amount: Balance::ZERO,
        }
    }

    pub fn mark_paid(&mut self, amount: Amount) {
        self.paid_amount += amount.into();
        self.status = MemberStatus::Paid;
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContributionStatus {
    #[default]
    Pending,
    Settled,
}

/// Cached contribution. `status == Settled` is the settlement marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionRecord {
    pub id: ContributionId,
    pub group_id: GroupId,
    pub member_id: MemberId,
    pub amount: Amount,
    pub reference: String,
    pub status: ContributionStatus,
    pub gateway_reference: Option<String>,
    pub paid_at: Option<String>,
}

impl ContributionRecord {
    pub fn pending(
        id: ContributionId,
        group_id: GroupId,
        member_id: MemberId,
        amount: Amount,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            id,
            group_id,
            member_id,
            amount,
            reference: reference.into(),
            status: ContributionStatus::Pending,
            gateway_reference: None,
            paid_at: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.status == ContributionStatus::Settled
    }
}

/// A server-confirmed payment ready to be written to the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub contribution_id: ContributionId,
    /// Amount the server says was received.
    pub amount: Amount,
    pub gateway_reference: Option<String>,
    pub paid_at: Option<String>,
    /// Contribution to insert when the cache has none for this id.
    pub origin: Option<ContributionRecord>,
}

impl Settlement {
    /// Builds a settlement from a verification. Only `SUCCESS` verifications qualify.
    pub fn from_verification(verification: &PaymentVerification) -> Result<Self, PaymentError> {
        if !verification.is_settled() {
            return Err(PaymentError::ValidationError(format!(
                "Contribution {} is not settled",
                verification.contribution_id
            )));
        }
        Ok(Self {
            contribution_id: verification.contribution_id.clone(),
            amount: verification.amount,
            gateway_reference: verification.gateway_reference.clone(),
            paid_at: verification.paid_at.clone(),
            origin: None,
        })
    }

    pub fn with_origin(mut self, origin: Option<ContributionRecord>) -> Self {
        self.origin = origin;
        self
    }

    /// Applies the settlement to the three records touched by a payment.
    ///
    /// Stores call this inside their own critical section, after checking the marker.
    pub fn apply(
        &self,
        group: &mut GroupRecord,
        member: &mut MemberRecord,
        contribution: &mut ContributionRecord,
    ) {
        group.credit(self.amount);
        member.mark_paid(self.amount);
        contribution.status = ContributionStatus::Settled;
        contribution.amount = self.amount;
        contribution.gateway_reference = self.gateway_reference.clone();
        contribution.paid_at = self.paid_at.clone();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettleOutcome {
    /// The marker was set and the group credited by this call.
    Applied(GroupRecord),
    /// The marker was already set, nothing changed.
    AlreadySettled,
}
