use super::ledger::{ContributionRecord, GroupRecord, MemberRecord, SettleOutcome, Settlement};
use super::payment::{
    ChargeOutcome, ChargeRequest, ContributionId, GroupId, MemberId, PaymentInitiation,
    PaymentRequest, PaymentVerification,
};
use crate::error::Result;
use async_trait::async_trait;

/// Remote payment endpoints of the crowdfunding API.
#[async_trait]
pub trait PaymentApi: Send + Sync {
    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentInitiation>;
    async fn verify_payment(&self, contribution_id: &ContributionId) -> Result<PaymentVerification>;
}

/// The third-party card charge flow. Suspends until the user finishes the dialog.
#[async_trait]
pub trait ChargeGateway: Send + Sync {
    async fn charge_card(&self, request: &ChargeRequest) -> ChargeOutcome;
}

/// Local cache of groups, members and contributions.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts a group unless one with the same id exists already.
    async fn ensure_group(&self, group: GroupRecord) -> Result<()>;
    async fn group(&self, id: &GroupId) -> Result<Option<GroupRecord>>;
    async fn all_groups(&self) -> Result<Vec<GroupRecord>>;
    async fn member(&self, group_id: &GroupId, member_id: &MemberId)
    -> Result<Option<MemberRecord>>;
    /// Inserts a contribution unless one with the same id exists already.
    async fn record_contribution(&self, contribution: ContributionRecord) -> Result<()>;
    async fn contribution(&self, id: &ContributionId) -> Result<Option<ContributionRecord>>;
    async fn pending_contributions(&self) -> Result<Vec<ContributionRecord>>;
    /// Checks and sets the settlement marker, crediting group and member in the same step.
    /// A missing contribution is taken from `settlement.origin` when present.
    async fn settle(&self, settlement: &Settlement) -> Result<SettleOutcome>;
}

pub type PaymentApiBox = Box<dyn PaymentApi>;
pub type ChargeGatewayBox = Box<dyn ChargeGateway>;
pub type LedgerStoreBox = Box<dyn LedgerStore>;
