use crate::domain::ledger::{
    ContributionRecord, GroupRecord, MemberRecord, SettleOutcome, Settlement,
};
use crate::domain::payment::{ContributionId, GroupId, MemberId};
use crate::domain::ports::LedgerStore;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    groups: HashMap<GroupId, GroupRecord>,
    members: HashMap<(GroupId, MemberId), MemberRecord>,
    contributions: HashMap<ContributionId, ContributionRecord>,
}

/// A thread-safe in-memory ledger cache.
///
/// All tables sit behind one `RwLock`, so `settle` checks the marker and writes
/// group, member and contribution under a single write guard.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn ensure_group(&self, group: GroupRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.groups.entry(group.id.clone()).or_insert(group);
        Ok(())
    }

    async fn group(&self, id: &GroupId) -> Result<Option<GroupRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.groups.get(id).cloned())
    }

    async fn all_groups(&self) -> Result<Vec<GroupRecord>> {
        let tables = self.tables.read().await;
        let mut groups: Vec<_> = tables.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(groups)
    }

    async fn member(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
    ) -> Result<Option<MemberRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .members
            .get(&(group_id.clone(), member_id.clone()))
            .cloned())
    }

    async fn record_contribution(&self, contribution: ContributionRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .contributions
            .entry(contribution.id.clone())
            .or_insert(contribution);
        Ok(())
    }

    async fn contribution(&self, id: &ContributionId) -> Result<Option<ContributionRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.contributions.get(id).cloned())
    }

    async fn pending_contributions(&self) -> Result<Vec<ContributionRecord>> {
        let tables = self.tables.read().await;
        let mut pending: Vec<_> = tables
            .contributions
            .values()
            .filter(|c| !c.is_settled())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(pending)
    }

    async fn settle(&self, settlement: &Settlement) -> Result<SettleOutcome> {
        let mut tables = self.tables.write().await;
        let Tables {
            groups,
            members,
            contributions,
        } = &mut *tables;

        let contribution = match contributions.entry(settlement.contribution_id.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => match &settlement.origin {
                Some(origin) => entry.insert(origin.clone()),
                None => {
                    return Err(PaymentError::ValidationError(format!(
                        "Unknown contribution {}",
                        settlement.contribution_id
                    )));
                }
            },
        };
        if contribution.is_settled() {
            return Ok(SettleOutcome::AlreadySettled);
        }

        let group = groups
            .entry(contribution.group_id.clone())
            .or_insert_with(|| {
                GroupRecord::new(contribution.group_id.clone(), contribution.group_id.0.clone())
            });
        let member = members
            .entry((contribution.group_id.clone(), contribution.member_id.clone()))
            .or_insert_with(|| {
                MemberRecord::new(contribution.group_id.clone(), contribution.member_id.clone())
            });

        settlement.apply(group, member, contribution);
        Ok(SettleOutcome::Applied(group.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::MemberStatus;
    use crate::domain::money::{Amount, Balance};
    use rust_decimal_macros::dec;

    fn pending(id: &str) -> ContributionRecord {
        ContributionRecord::pending(
            id.into(),
            "g-1".into(),
            "m-1".into(),
            Amount::new(dec!(100.0)).unwrap(),
            "GF-1",
        )
    }

    fn settlement(id: &str) -> Settlement {
        Settlement {
            contribution_id: id.into(),
            amount: Amount::new(dec!(100.0)).unwrap(),
            gateway_reference: Some("ref".into()),
            paid_at: None,
            origin: None,
        }
    }

    #[tokio::test]
    async fn test_in_memory_group_store() {
        let store = InMemoryLedgerStore::new();
        let group = GroupRecord::new("g-1".into(), "Rent");

        store.ensure_group(group.clone()).await.unwrap();
        let retrieved = store.group(&"g-1".into()).await.unwrap().unwrap();
        assert_eq!(retrieved, group);

        assert!(store.group(&"g-2".into()).await.unwrap().is_none());
        assert_eq!(store.all_groups().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_contribution_does_not_overwrite() {
        let store = InMemoryLedgerStore::new();
        store.record_contribution(pending("c-1")).await.unwrap();
        store.settle(&settlement("c-1")).await.unwrap();

        // A late duplicate must not reset the settlement marker.
        store.record_contribution(pending("c-1")).await.unwrap();
        let stored = store.contribution(&"c-1".into()).await.unwrap().unwrap();
        assert!(stored.is_settled());
        assert!(store.pending_contributions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settle_is_idempotent() {
        let store = InMemoryLedgerStore::new();
        store
            .ensure_group(GroupRecord::new("g-1".into(), "Rent"))
            .await
            .unwrap();
        store.record_contribution(pending("c-1")).await.unwrap();

        let first = store.settle(&settlement("c-1")).await.unwrap();
        let second = store.settle(&settlement("c-1")).await.unwrap();

        assert!(matches!(first, SettleOutcome::Applied(_)));
        assert_eq!(second, SettleOutcome::AlreadySettled);

        let group = store.group(&"g-1".into()).await.unwrap().unwrap();
        assert_eq!(group.collected, Balance::new(dec!(100.0)));
        assert_eq!(group.name, "Rent");

        let member = store
            .member(&"g-1".into(), &"m-1".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(member.status, MemberStatus::Paid);
    }

    #[tokio::test]
    async fn test_settle_unknown_contribution_fails() {
        let store = InMemoryLedgerStore::new();
        let result = store.settle(&settlement("missing")).await;
        assert!(matches!(result, Err(PaymentError::ValidationError(_))));
        assert!(store.all_groups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_settles_credit_once() {
        let store = InMemoryLedgerStore::new();
        store.record_contribution(pending("c-1")).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.settle(&settlement("c-1")).await.unwrap() })
            })
            .collect();

        let mut applied = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), SettleOutcome::Applied(_)) {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);

        let group = store.group(&"g-1".into()).await.unwrap().unwrap();
        assert_eq!(group.collected, Balance::new(dec!(100.0)));
        assert_eq!(group.contributors, 1);
    }

    #[tokio::test]
    async fn test_ensure_group_keeps_settled_totals() {
        let store = InMemoryLedgerStore::new();
        store
            .ensure_group(GroupRecord::new("g-1".into(), "Rent"))
            .await
            .unwrap();
        store.record_contribution(pending("c-1")).await.unwrap();
        store.settle(&settlement("c-1")).await.unwrap();

        // A late first-time contributor must not reset what is already collected.
        store
            .ensure_group(GroupRecord::new("g-1".into(), "Rent"))
            .await
            .unwrap();

        let group = store.group(&"g-1".into()).await.unwrap().unwrap();
        assert_eq!(group.collected, Balance::new(dec!(100.0)));
        assert_eq!(group.contributors, 1);
    }

    #[tokio::test]
    async fn test_settle_inserts_missing_contribution_from_origin() {
        let store = InMemoryLedgerStore::new();
        let settlement = settlement("c-1").with_origin(Some(pending("c-1")));

        let outcome = store.settle(&settlement).await.unwrap();
        assert!(matches!(outcome, SettleOutcome::Applied(_)));
        assert_eq!(store.settle(&settlement).await.unwrap(), SettleOutcome::AlreadySettled);

        let stored = store.contribution(&"c-1".into()).await.unwrap().unwrap();
        assert!(stored.is_settled());
        let group = store.group(&"g-1".into()).await.unwrap().unwrap();
        assert_eq!(group.collected, Balance::new(dec!(100.0)));
        assert_eq!(group.contributors, 1);
    }
}
