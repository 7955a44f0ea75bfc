use crate::domain::ledger::{
    ContributionRecord, GroupRecord, MemberRecord, SettleOutcome, Settlement,
};
use crate::domain::payment::{ContributionId, GroupId, MemberId};
use crate::domain::ports::LedgerStore;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for cached groups.
pub const CF_GROUPS: &str = "groups";
/// Column Family for cached group memberships.
pub const CF_MEMBERS: &str = "members";
/// Column Family for contributions and their settlement markers.
pub const CF_CONTRIBUTIONS: &str = "contributions";

/// A persistent ledger cache backed by RocksDB.
///
/// Groups, members and contributions live in separate Column Families. Writes that
/// touch the settlement marker go through `write_lock` and land as one `WriteBatch`,
/// so a contribution is never credited twice even when two reconciliations race.
///
/// `Clone` shares the underlying `Arc<DB>` and the write lock.
#[derive(Clone)]
pub struct RocksDBLedgerStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

fn member_key(group_id: &GroupId, member_id: &MemberId) -> Vec<u8> {
    let mut key = Vec::with_capacity(group_id.0.len() + member_id.0.len() + 1);
    key.extend_from_slice(group_id.0.as_bytes());
    key.push(0);
    key.extend_from_slice(member_id.0.as_bytes());
    key
}

impl RocksDBLedgerStore {
    /// Opens or creates a RocksDB ledger at `path`, creating missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_GROUPS, CF_MEMBERS, CF_CONTRIBUTIONS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PaymentError::StorageError(format!("{} column family not found", name)))
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_pinned_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(cf, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }
}

#[async_trait]
impl LedgerStore for RocksDBLedgerStore {
    async fn ensure_group(&self, group: GroupRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let existing: Option<GroupRecord> = self.read(CF_GROUPS, group.id.0.as_bytes())?;
        if existing.is_none() {
            self.write(CF_GROUPS, group.id.0.as_bytes(), &group)?;
        }
        Ok(())
    }

    async fn group(&self, id: &GroupId) -> Result<Option<GroupRecord>> {
        self.read(CF_GROUPS, id.0.as_bytes())
    }

    async fn all_groups(&self) -> Result<Vec<GroupRecord>> {
        self.scan(CF_GROUPS)
    }

    async fn member(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
    ) -> Result<Option<MemberRecord>> {
        self.read(CF_MEMBERS, &member_key(group_id, member_id))
    }

    async fn record_contribution(&self, contribution: ContributionRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let existing: Option<ContributionRecord> =
            self.read(CF_CONTRIBUTIONS, contribution.id.0.as_bytes())?;
        if existing.is_none() {
            self.write(CF_CONTRIBUTIONS, contribution.id.0.as_bytes(), &contribution)?;
        }
        Ok(())
    }

    async fn contribution(&self, id: &ContributionId) -> Result<Option<ContributionRecord>> {
        self.read(CF_CONTRIBUTIONS, id.0.as_bytes())
    }

    async fn pending_contributions(&self) -> Result<Vec<ContributionRecord>> {
        let all: Vec<ContributionRecord> = self.scan(CF_CONTRIBUTIONS)?;
        Ok(all.into_iter().filter(|c| !c.is_settled()).collect())
    }

    async fn settle(&self, settlement: &Settlement) -> Result<SettleOutcome> {
        let _guard = self.write_lock.lock().await;

        let mut contribution: ContributionRecord = self
            .read(CF_CONTRIBUTIONS, settlement.contribution_id.0.as_bytes())?
            .or_else(|| settlement.origin.clone())
            .ok_or_else(|| {
                PaymentError::ValidationError(format!(
                    "Unknown contribution {}",
                    settlement.contribution_id
                ))
            })?;
        if contribution.is_settled() {
            return Ok(SettleOutcome::AlreadySettled);
        }

        let group_id = contribution.group_id.clone();
        let member_id = contribution.member_id.clone();
        let mut group = self
            .read(CF_GROUPS, group_id.0.as_bytes())?
            .unwrap_or_else(|| GroupRecord::new(group_id.clone(), group_id.0.clone()));
        let mut member = self
            .read(CF_MEMBERS, &member_key(&group_id, &member_id))?
            .unwrap_or_else(|| MemberRecord::new(group_id.clone(), member_id.clone()));

        settlement.apply(&mut group, &mut member, &mut contribution);

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_GROUPS)?,
            group_id.0.as_bytes(),
            serde_json::to_vec(&group)?,
        );
        batch.put_cf(
            self.cf(CF_MEMBERS)?,
            member_key(&group_id, &member_id),
            serde_json::to_vec(&member)?,
        );
        batch.put_cf(
            self.cf(CF_CONTRIBUTIONS)?,
            contribution.id.0.as_bytes(),
            serde_json::to_vec(&contribution)?,
        );
        self.db.write(batch)?;

        Ok(SettleOutcome::Applied(group))
    }
}
