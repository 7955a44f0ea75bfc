#![allow(dead_code)]

use async_trait::async_trait;
use groupfund::application::orchestrator::PaymentOrchestrator;
use groupfund::application::reconciler::LedgerReconciler;
use groupfund::config::PollingConfig;
use groupfund::domain::ledger::{
    ContributionRecord, GroupRecord, MemberRecord, SettleOutcome, Settlement,
};
use groupfund::domain::money::Amount;
use groupfund::domain::payment::{
    ChargeOutcome, ChargeRequest, ContributionId, GroupId, MemberId, PaymentInitiation,
    PaymentRequest, PaymentVerification, VerificationStatus,
};
use groupfund::domain::ports::{ChargeGateway, LedgerStore, PaymentApi};
use groupfund::error::{PaymentError, Result};
use groupfund::infrastructure::in_memory::InMemoryLedgerStore;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CONTRIBUTION: &str = "c-100";
pub const GROUP: &str = "g-1";
pub const MEMBER: &str = "m-1";

/// One scripted answer from the verification endpoint.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(VerificationStatus),
    Network(String),
    /// A non-transient rejection, e.g. an auth failure.
    Rejected(String),
}

struct ApiState {
    initiation: std::result::Result<PaymentInitiation, String>,
    replies: Mutex<VecDeque<Reply>>,
    last_reply: Mutex<Reply>,
    amount: Amount,
    numbered: bool,
    initiate_calls: AtomicU32,
    verify_calls: AtomicU32,
}

fn initiation(amount: Amount) -> PaymentInitiation {
    PaymentInitiation {
        contribution_id: CONTRIBUTION.into(),
        authorization_handle: "access_abc".to_string(),
        reference: "GF-100".to_string(),
        amount,
        group_id: GROUP.into(),
        group_name: "Team offsite".to_string(),
    }
}

/// Fake remote API. Verification replies are consumed in order; the last one repeats.
#[derive(Clone)]
pub struct ScriptedApi {
    state: Arc<ApiState>,
}

impl ScriptedApi {
    pub fn new(amount: Decimal, replies: Vec<Reply>) -> Self {
        let amount = Amount::new(amount).unwrap();
        Self::with_initiation(Ok(initiation(amount)), amount, replies, false)
    }

    /// Like `new`, but each initiation gets its own contribution id: `c-0`, `c-1`, ...
    pub fn numbered(amount: Decimal, replies: Vec<Reply>) -> Self {
        let amount = Amount::new(amount).unwrap();
        Self::with_initiation(Ok(initiation(amount)), amount, replies, true)
    }

    pub fn rejecting(reason: &str) -> Self {
        Self::with_initiation(
            Err(reason.to_string()),
            Amount::new(Decimal::ONE).unwrap(),
            vec![Reply::Network("unreachable".into())],
            false,
        )
    }

    fn with_initiation(
        initiation: std::result::Result<PaymentInitiation, String>,
        amount: Amount,
        replies: Vec<Reply>,
        numbered: bool,
    ) -> Self {
        let last = replies
            .last()
            .cloned()
            .unwrap_or(Reply::Network("no reply scripted".into()));
        Self {
            state: Arc::new(ApiState {
                initiation,
                replies: Mutex::new(replies.into()),
                last_reply: Mutex::new(last),
                amount,
                numbered,
                initiate_calls: AtomicU32::new(0),
                verify_calls: AtomicU32::new(0),
            }),
        }
    }

    /// Replaces the remaining script, e.g. once the payment settles later.
    pub fn set_replies(&self, replies: Vec<Reply>) {
        if let Some(last) = replies.last() {
            *self.state.last_reply.lock().unwrap() = last.clone();
        }
        *self.state.replies.lock().unwrap() = replies.into();
    }

    pub fn initiate_calls(&self) -> u32 {
        self.state.initiate_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> u32 {
        self.state.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentApi for ScriptedApi {
    async fn initiate_payment(&self, _request: &PaymentRequest) -> Result<PaymentInitiation> {
        let call = self.state.initiate_calls.fetch_add(1, Ordering::SeqCst);
        let mut initiation = self
            .state
            .initiation
            .clone()
            .map_err(PaymentError::InitiationFailure)?;
        if self.state.numbered {
            initiation.contribution_id = ContributionId(format!("c-{call}"));
            initiation.reference = format!("GF-{call}");
        }
        Ok(initiation)
    }

    async fn verify_payment(&self, contribution_id: &ContributionId) -> Result<PaymentVerification> {
        self.state.verify_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .state
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.state.last_reply.lock().unwrap().clone());
        match reply {
            Reply::Network(message) => Err(PaymentError::VerificationTransientFailure(message)),
            Reply::Rejected(message) => Err(PaymentError::ValidationError(message)),
            Reply::Status(status) => Ok(PaymentVerification {
                contribution_id: contribution_id.clone(),
                status,
                amount: self.state.amount,
                paid_at: (status == VerificationStatus::Success)
                    .then(|| "2026-10-19T10:00:00Z".to_string()),
                gateway_reference: Some("ref123".to_string()),
                message: (status == VerificationStatus::Failed)
                    .then(|| "Insufficient funds".to_string()),
            }),
        }
    }
}

/// Fake card gateway that always ends the same way and records what it was asked.
#[derive(Clone)]
pub struct ScriptedGateway {
    outcome: ChargeOutcome,
    calls: Arc<AtomicU32>,
    last_request: Arc<Mutex<Option<ChargeRequest>>>,
}

impl ScriptedGateway {
    pub fn new(outcome: ChargeOutcome) -> Self {
        Self {
            outcome,
            calls: Arc::new(AtomicU32::new(0)),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ChargeRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChargeGateway for ScriptedGateway {
    async fn charge_card(&self, request: &ChargeRequest) -> ChargeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        self.outcome.clone()
    }
}

/// In-memory ledger with switchable faults.
#[derive(Clone, Default)]
pub struct FlakyLedgerStore {
    inner: InMemoryLedgerStore,
    fail_settle: Arc<AtomicBool>,
    fail_next_record: Arc<AtomicBool>,
    slow_first_group: Arc<Mutex<Option<Duration>>>,
}

impl FlakyLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `settle` fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.fail_settle.store(failing, Ordering::SeqCst);
    }

    /// Makes the next `record_contribution` fail.
    pub fn fail_next_record(&self) {
        self.fail_next_record.store(true, Ordering::SeqCst);
    }

    /// Holds the first `ensure_group` call back by `delay`.
    pub fn slow_first_group(&self, delay: Duration) {
        *self.slow_first_group.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl LedgerStore for FlakyLedgerStore {
    async fn ensure_group(&self, group: GroupRecord) -> Result<()> {
        let delay = self.slow_first_group.lock().unwrap().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.ensure_group(group).await
    }

    async fn group(&self, id: &GroupId) -> Result<Option<GroupRecord>> {
        self.inner.group(id).await
    }

    async fn all_groups(&self) -> Result<Vec<GroupRecord>> {
        self.inner.all_groups().await
    }

    async fn member(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
    ) -> Result<Option<MemberRecord>> {
        self.inner.member(group_id, member_id).await
    }

    async fn record_contribution(&self, contribution: ContributionRecord) -> Result<()> {
        if self.fail_next_record.swap(false, Ordering::SeqCst) {
            return Err(PaymentError::StorageError("disk full".into()));
        }
        self.inner.record_contribution(contribution).await
    }

    async fn contribution(&self, id: &ContributionId) -> Result<Option<ContributionRecord>> {
        self.inner.contribution(id).await
    }

    async fn pending_contributions(&self) -> Result<Vec<ContributionRecord>> {
        self.inner.pending_contributions().await
    }

    async fn settle(&self, settlement: &Settlement) -> Result<SettleOutcome> {
        if self.fail_settle.load(Ordering::SeqCst) {
            return Err(PaymentError::StorageError("disk full".into()));
        }
        self.inner.settle(settlement).await
    }
}

pub fn request(amount: Decimal) -> PaymentRequest {
    PaymentRequest {
        group_id: GROUP.into(),
        member_id: MEMBER.into(),
        email: "ada@example.com".to_string(),
        amount: Amount::new(amount).unwrap(),
    }
}

pub fn orchestrator(
    api: &ScriptedApi,
    gateway: &ScriptedGateway,
    store: impl LedgerStore + 'static,
) -> PaymentOrchestrator {
    PaymentOrchestrator::new(
        Box::new(api.clone()),
        Box::new(gateway.clone()),
        LedgerReconciler::new(Box::new(store)),
    )
    .with_polling(PollingConfig::default())
}

pub fn write_notifications(path: &Path, rows: &[[&str; 6]]) -> std::result::Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["contribution", "group", "member", "status", "amount", "reference"])?;
    for row in rows {
        wtr.write_record(row)?;
    }

    wtr.flush()?;
    Ok(())
}
