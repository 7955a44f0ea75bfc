use super::poller::{PollingResult, TIMEOUT_MESSAGE, VerificationPoller};
use super::reconciler::{LedgerReconciler, Reconciliation};
use crate::config::PollingConfig;
use crate::domain::ledger::{ContributionRecord, GroupRecord};
use crate::domain::payment::{
    ChargeOutcome, ChargeRequest, ContributionId, PaymentInitiation, PaymentRequest,
    PaymentVerification, VerificationStatus,
};
use crate::domain::ports::{ChargeGatewayBox, PaymentApi, PaymentApiBox};
use crate::domain::resource::{ErrorKind, Resource};
use crate::error::{PaymentError, Result};
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_stream::{Stream, StreamExt};
use tracing::{error, info, warn};

/// Lifecycle event of one payment attempt, as seen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentState {
    Checking {
        attempt: u32,
        max_attempts: u32,
    },
    /// Server confirmed the payment and the cache was credited.
    Success(PaymentVerification),
    Error {
        kind: ErrorKind,
        message: String,
    },
    Cancelled,
    /// Server confirmed the payment but the cache write failed.
    /// Retry with [`PaymentOrchestrator::reconcile`], never by charging again.
    ReconciliationFailed {
        verification: PaymentVerification,
        message: String,
    },
}

impl PaymentState {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Checking { .. })
    }

    pub fn to_resource(&self) -> Resource<PaymentVerification> {
        match self {
            Self::Checking { .. } => Resource::Loading,
            Self::Success(verification) => Resource::success(verification.clone()),
            Self::Error { kind, message } => Resource::error(*kind, message.clone()),
            Self::Cancelled => Resource::error(ErrorKind::GatewayFailure, "Payment cancelled"),
            Self::ReconciliationFailed { message, .. } => {
                Resource::error(ErrorKind::ReconciliationFailure, message.clone())
            }
        }
    }
}

impl From<PaymentError> for PaymentState {
    fn from(error: PaymentError) -> Self {
        Self::error(error.kind(), error.to_string())
    }
}

/// A verification that ended polling: a definitive status, or an error not worth retrying.
type Verdict = std::result::Result<PaymentVerification, PaymentError>;

type VerificationEvents<'a> = Pin<Box<dyn Stream<Item = PollingResult<Verdict>> + Send + 'a>>;

/// Drives contributions from initiation to a reconciled, terminal outcome.
///
/// The gateway's own success signal is never trusted: every charge is confirmed
/// against the remote verification endpoint before the cache is touched.
pub struct PaymentOrchestrator {
    api: PaymentApiBox,
    gateway: ChargeGatewayBox,
    reconciler: LedgerReconciler,
    poller: VerificationPoller,
    in_flight: Mutex<HashSet<ContributionId>>,
    /// Charged contributions the cache failed to record, kept for settlement and re-verification.
    unrecorded: Mutex<HashMap<ContributionId, ContributionRecord>>,
}

impl PaymentOrchestrator {
    pub fn new(api: PaymentApiBox, gateway: ChargeGatewayBox, reconciler: LedgerReconciler) -> Self {
        Self {
            api,
            gateway,
            reconciler,
            poller: VerificationPoller::default(),
            in_flight: Mutex::new(HashSet::new()),
            unrecorded: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_polling(mut self, config: PollingConfig) -> Self {
        self.poller = VerificationPoller::new(config);
        self
    }

    pub fn reconciler(&self) -> &LedgerReconciler {
        &self.reconciler
    }

    /// Starts a full payment: initiate, charge, verify, reconcile.
    ///
    /// The returned run is lazy; nothing is sent anywhere until the first `next()`.
    pub fn pay(&self, request: PaymentRequest) -> PaymentRun<'_> {
        PaymentRun {
            orchestrator: self,
            step: Step::Initiate(request),
        }
    }

    /// Verifies and reconciles an existing contribution without charging again.
    pub fn reverify(&self, contribution_id: ContributionId) -> PaymentRun<'_> {
        PaymentRun {
            orchestrator: self,
            step: Step::Verify(contribution_id),
        }
    }

    /// Re-verifies every contribution the cache still holds as pending, one at a time.
    pub async fn reverify_pending(&self) -> Result<Vec<(ContributionId, PaymentState)>> {
        let mut ids: Vec<ContributionId> = self
            .reconciler
            .store()
            .pending_contributions()
            .await?
            .into_iter()
            .map(|contribution| contribution.id)
            .collect();
        for id in self.unrecorded_ids() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(state) = self.reverify(id.clone()).finish().await {
                outcomes.push((id, state));
            }
        }
        Ok(outcomes)
    }

    /// Cache-only retry after [`PaymentState::ReconciliationFailed`].
    pub async fn reconcile(&self, verification: &PaymentVerification) -> Result<Reconciliation> {
        let id = &verification.contribution_id;
        let origin = self.unrecorded().get(id).cloned();
        let outcome = self.reconciler.apply_with_origin(verification, origin).await?;
        if outcome != Reconciliation::Skipped {
            self.unrecorded().remove(id);
        }
        Ok(outcome)
    }

    fn unrecorded(&self) -> MutexGuard<'_, HashMap<ContributionId, ContributionRecord>> {
        self.unrecorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unrecorded_ids(&self) -> Vec<ContributionId> {
        let mut ids: Vec<_> = self.unrecorded().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Initiation and gateway charge. `Err` carries the terminal state to emit.
    async fn initiate_and_charge(
        &self,
        request: &PaymentRequest,
    ) -> std::result::Result<ContributionId, PaymentState> {
        let initiation = self.api.initiate_payment(request).await.map_err(|e| {
            warn!(group_id = %request.group_id, error = %e, "payment initiation rejected");
            PaymentState::error(ErrorKind::InitiationFailure, e.to_string())
        })?;
        let contribution_id = initiation.contribution_id.clone();
        info!(
            contribution_id = %contribution_id,
            group_id = %initiation.group_id,
            reference = %initiation.reference,
            "payment initiated"
        );

        let charge = ChargeRequest {
            email: request.email.clone(),
            amount_minor: initiation.amount.to_minor_units().map_err(PaymentState::from)?,
            access_code: initiation.authorization_handle.clone(),
        };
        match self.gateway.charge_card(&charge).await {
            ChargeOutcome::Success(reference) => {
                info!(
                    contribution_id = %contribution_id,
                    gateway_reference = %reference,
                    "charge completed, awaiting server verification"
                );
                // Keeps the contribution re-verifiable if this run never sees a verdict.
                let record = ContributionRecord::pending(
                    contribution_id.clone(),
                    initiation.group_id.clone(),
                    request.member_id.clone(),
                    initiation.amount,
                    initiation.reference.clone(),
                );
                if let Err(e) = self.record_pending(&initiation, record.clone()).await {
                    error!(
                        contribution_id = %contribution_id,
                        error = %e,
                        "could not record pending contribution, holding it until settled"
                    );
                    self.unrecorded().insert(contribution_id.clone(), record);
                }
                Ok(contribution_id)
            }
            ChargeOutcome::Error(reason) => {
                warn!(contribution_id = %contribution_id, %reason, "charge failed");
                Err(PaymentError::GatewayFailure(reason).into())
            }
            ChargeOutcome::Cancelled => {
                info!(contribution_id = %contribution_id, "charge cancelled by user");
                Err(PaymentState::Cancelled)
            }
        }
    }

    async fn record_pending(
        &self,
        initiation: &PaymentInitiation,
        record: ContributionRecord,
    ) -> Result<()> {
        let store = self.reconciler.store();
        store
            .ensure_group(GroupRecord::new(
                initiation.group_id.clone(),
                initiation.group_name.clone(),
            ))
            .await?;
        store.record_contribution(record).await
    }

    fn start_verification(&self, contribution_id: ContributionId) -> Result<Step<'_>> {
        let guard = InFlightGuard::acquire(&self.in_flight, contribution_id.clone())?;
        let api = self.api.as_ref();
        let id = contribution_id.clone();
        let events: VerificationEvents<'_> =
            Box::pin(self.poller.poll(move || check_verification(api, id.clone())));
        Ok(Step::Polling {
            contribution_id,
            events,
            _guard: guard,
        })
    }

    async fn conclude(&self, verification: PaymentVerification) -> PaymentState {
        match verification.status {
            VerificationStatus::Success => match self.reconcile(&verification).await {
                Ok(_) => PaymentState::Success(verification),
                Err(e) => PaymentState::ReconciliationFailed {
                    verification,
                    message: e.to_string(),
                },
            },
            VerificationStatus::Failed => {
                let reason = verification
                    .message
                    .clone()
                    .unwrap_or_else(|| "Payment was declined".to_string());
                warn!(
                    contribution_id = %verification.contribution_id,
                    %reason,
                    "payment declined by server"
                );
                PaymentError::VerificationDefinitiveFailure(reason).into()
            }
            // The check never lets a pending verification through.
            VerificationStatus::Pending => {
                PaymentState::error(ErrorKind::VerificationTimeout, TIMEOUT_MESSAGE)
            }
        }
    }
}

/// One verification request. `Err` asks the poller for another attempt.
///
/// Pending and transient request errors are retried. `SUCCESS`, `FAILED` and any
/// other error end polling and are interpreted by the orchestrator.
async fn check_verification(
    api: &dyn PaymentApi,
    contribution_id: ContributionId,
) -> Result<Verdict> {
    match api.verify_payment(&contribution_id).await {
        Ok(verification) if verification.status == VerificationStatus::Pending => {
            Err(PaymentError::VerificationPending)
        }
        Ok(verification) => Ok(Ok(verification)),
        Err(e) if e.is_retryable() => Err(e),
        Err(e) => Ok(Err(e)),
    }
}

/// Marks a contribution as being verified for as long as it lives.
struct InFlightGuard<'a> {
    registry: &'a Mutex<HashSet<ContributionId>>,
    contribution_id: ContributionId,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(
        registry: &'a Mutex<HashSet<ContributionId>>,
        contribution_id: ContributionId,
    ) -> Result<Self> {
        let inserted = registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(contribution_id.clone());
        if !inserted {
            return Err(PaymentError::VerificationInFlight(contribution_id.to_string()));
        }
        Ok(Self {
            registry,
            contribution_id,
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.contribution_id);
    }
}

enum Step<'a> {
    Initiate(PaymentRequest),
    Verify(ContributionId),
    Polling {
        contribution_id: ContributionId,
        events: VerificationEvents<'a>,
        _guard: InFlightGuard<'a>,
    },
    Done,
}

/// Lazy, single-consumer sequence of [`PaymentState`]s for one attempt.
///
/// Yields any number of `Checking` states and then exactly one terminal state.
/// Dropping the run abandons it: no further verification is scheduled and the
/// cache is left as it was.
pub struct PaymentRun<'a> {
    orchestrator: &'a PaymentOrchestrator,
    step: Step<'a>,
}

impl<'a> PaymentRun<'a> {
    pub async fn next(&mut self) -> Option<PaymentState> {
        let orchestrator: &'a PaymentOrchestrator = self.orchestrator;
        loop {
            match std::mem::replace(&mut self.step, Step::Done) {
                Step::Done => return None,
                Step::Initiate(request) => {
                    match orchestrator.initiate_and_charge(&request).await {
                        Ok(contribution_id) => self.step = Step::Verify(contribution_id),
                        Err(terminal) => return Some(terminal),
                    }
                }
                Step::Verify(contribution_id) => {
                    match orchestrator.start_verification(contribution_id) {
                        Ok(polling) => self.step = polling,
                        Err(e) => return Some(e.into()),
                    }
                }
                Step::Polling {
                    contribution_id,
                    mut events,
                    _guard,
                } => match events.next().await {
                    Some(PollingResult::Checking {
                        attempt,
                        max_attempts,
                    }) => {
                        self.step = Step::Polling {
                            contribution_id,
                            events,
                            _guard,
                        };
                        return Some(PaymentState::Checking {
                            attempt,
                            max_attempts,
                        });
                    }
                    Some(PollingResult::Success(Ok(verification))) => {
                        drop(events);
                        return Some(orchestrator.conclude(verification).await);
                    }
                    Some(PollingResult::Success(Err(e))) => {
                        error!(
                            contribution_id = %contribution_id,
                            error = %e,
                            "verification failed permanently"
                        );
                        return Some(e.into());
                    }
                    Some(PollingResult::Failed(message)) => {
                        warn!(
                            contribution_id = %contribution_id,
                            "verification budget exhausted, contribution left pending"
                        );
                        return Some(PaymentState::error(ErrorKind::VerificationTimeout, message));
                    }
                    None => return None,
                },
            }
        }
    }

    /// Drains the run and returns its terminal state.
    pub async fn finish(mut self) -> Option<PaymentState> {
        let mut last = None;
        while let Some(state) = self.next().await {
            last = Some(state);
        }
        last
    }

    /// Drains the run, keeping every state in order.
    pub async fn collect(mut self) -> Vec<PaymentState> {
        let mut states = Vec::new();
        while let Some(state) = self.next().await {
            states.push(state);
        }
        states
    }
}
