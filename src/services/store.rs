use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::serde_id;
use crate::error::Result;
use crate::kernel::profile::AccountId;

/// Persisted timing for one account, so schedules survive a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub event_id: u32,
    pub last_claim: i64,
    pub next_action_at: i64,
    pub step: u32,
    pub tier: u32,
    pub exp: u64,
}

/// A subscribed account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    #[serde(deserialize_with = "serde_id::number")]
    pub login_id: u64,
    #[serde(deserialize_with = "serde_id::number")]
    pub user_id: u64,
    #[serde(default)]
    pub schedule: Option<ScheduleRecord>,
}

impl AccountRecord {
    pub fn new(id: impl Into<String>, login_id: u64, user_id: u64) -> Self {
        Self {
            id: AccountId::new(id),
            login_id,
            user_id,
            schedule: None,
        }
    }
}

/// Subscription list and per-account schedule persistence.
pub trait AccountStore: Send + Sync + 'static {
    fn list_accounts(&self) -> impl Future<Output = Result<Vec<AccountRecord>>> + Send;

    fn load_schedule(
        &self,
        account: &AccountId,
    ) -> impl Future<Output = Result<Option<ScheduleRecord>>> + Send;

    fn save_schedule(
        &self,
        account: &AccountId,
        record: ScheduleRecord,
    ) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    accounts: Vec<AccountRecord>,
}

/// One JSON document holding every account record.
///
/// A missing file reads as an empty subscription list. Writes go through a
/// temporary sibling file and a rename.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<StoreDocument> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(StoreDocument::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, document: &StoreDocument) -> Result<()> {
        let json = serde_json::to_vec_pretty(document)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Adds or replaces an account record.
    pub async fn upsert_account(&self, record: AccountRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.read().await?;
        match document.accounts.iter_mut().find(|a| a.id == record.id) {
            Some(existing) => *existing = record,
            None => document.accounts.push(record),
        }
        self.write(&document).await
    }

    pub async fn remove_account(&self, account: &AccountId) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut document = self.read().await?;
        let before = document.accounts.len();
        document.accounts.retain(|a| &a.id != account);
        if document.accounts.len() == before {
            return Ok(false);
        }
        self.write(&document).await?;
        Ok(true)
    }
}

impl AccountStore for JsonFileStore {
    async fn list_accounts(&self) -> Result<Vec<AccountRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.accounts)
    }

    async fn load_schedule(&self, account: &AccountId) -> Result<Option<ScheduleRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read()
            .await?
            .accounts
            .into_iter()
            .find(|a| &a.id == account)
            .and_then(|a| a.schedule))
    }

    async fn save_schedule(&self, account: &AccountId, record: ScheduleRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.read().await?;
        match document.accounts.iter_mut().find(|a| &a.id == account) {
            Some(entry) => entry.schedule = Some(record),
            None => {
                // Unsubscribed while the runner was mid-cycle.
                debug!(account = %account, "Dropping schedule for unknown account");
                return Ok(());
            }
        }
        self.write(&document).await
    }
}

/// In-process store, for tests and one-shot runs.
#[derive(Default)]
pub struct MemoryStore {
    accounts: Mutex<Vec<AccountRecord>>,
    schedules: Mutex<HashMap<AccountId, ScheduleRecord>>,
}

impl MemoryStore {
    pub fn new(accounts: Vec<AccountRecord>) -> Self {
        let schedules = accounts
            .iter()
            .filter_map(|a| a.schedule.map(|s| (a.id.clone(), s)))
            .collect();
        Self {
            accounts: Mutex::new(accounts),
            schedules: Mutex::new(schedules),
        }
    }

    pub async fn add(&self, record: AccountRecord) {
        let mut accounts = self.accounts.lock().await;
        accounts.retain(|a| a.id != record.id);
        accounts.push(record);
    }

    pub async fn remove(&self, account: &AccountId) {
        self.accounts.lock().await.retain(|a| &a.id != account);
    }

    pub async fn schedule(&self, account: &AccountId) -> Option<ScheduleRecord> {
        self.schedules.lock().await.get(account).copied()
    }
}

impl AccountStore for MemoryStore {
    async fn list_accounts(&self) -> Result<Vec<AccountRecord>> {
        Ok(self.accounts.lock().await.clone())
    }

    async fn load_schedule(&self, account: &AccountId) -> Result<Option<ScheduleRecord>> {
        Ok(self.schedules.lock().await.get(account).copied())
    }

    async fn save_schedule(&self, account: &AccountId, record: ScheduleRecord) -> Result<()> {
        self.schedules.lock().await.insert(account.clone(), record);
        Ok(())
    }
}
