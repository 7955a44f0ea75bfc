use crate::domain::ledger::{ContributionRecord, SettleOutcome, Settlement};
use crate::domain::payment::PaymentVerification;
use crate::domain::ports::LedgerStoreBox;
use crate::error::{PaymentError, Result};
use tracing::{error, info};

/// What a reconciliation did to the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// The group and member were credited by this call.
    Applied,
    /// The settlement marker was already set.
    AlreadyApplied,
    /// The verification was not `SUCCESS`; the cache is untouched.
    Skipped,
}

/// Applies server-confirmed payments to the local ledger cache.
pub struct LedgerReconciler {
    store: LedgerStoreBox,
}

impl LedgerReconciler {
    pub fn new(store: LedgerStoreBox) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LedgerStoreBox {
        &self.store
    }

    /// Credits the group for a successful verification, at most once per contribution.
    ///
    /// Store failures come back as `ReconciliationFailure`: the payment went through
    /// but the cache does not show it yet, and calling `apply` again is safe.
    pub async fn apply(&self, verification: &PaymentVerification) -> Result<Reconciliation> {
        self.apply_with_origin(verification, None).await
    }

    /// Like [`apply`](Self::apply), but inserts `origin` if the cache never recorded
    /// the contribution.
    pub async fn apply_with_origin(
        &self,
        verification: &PaymentVerification,
        origin: Option<ContributionRecord>,
    ) -> Result<Reconciliation> {
        if !verification.is_settled() {
            return Ok(Reconciliation::Skipped);
        }
        let settlement = Settlement::from_verification(verification)?.with_origin(origin);

        match self.store.settle(&settlement).await {
            Ok(SettleOutcome::Applied(group)) => {
                info!(
                    contribution_id = %verification.contribution_id,
                    group_id = %group.id,
                    amount = %verification.amount,
                    collected = %group.collected,
                    "contribution reconciled"
                );
                Ok(Reconciliation::Applied)
            }
            Ok(SettleOutcome::AlreadySettled) => {
                info!(
                    contribution_id = %verification.contribution_id,
                    "contribution already reconciled"
                );
                Ok(Reconciliation::AlreadyApplied)
            }
            Err(e) => {
                error!(
                    contribution_id = %verification.contribution_id,
                    error = %e,
                    "payment confirmed but cache update failed"
                );
                Err(PaymentError::ReconciliationFailure(e.to_string()))
            }
        }
    }
}
