use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, RwLock, TryLockError};

use chrono::{DateTime, Utc};

use super::domain::{DetailId, TransactionId};
use super::settlement::Settlement;
use super::snapshot::ConfigurationSnapshot;

/// A proposed next configuration computed against `base_revision`.
#[derive(Debug, Clone)]
pub struct PendingChange {
    pub base_revision: u64,
    pub snapshot: ConfigurationSnapshot,
    pub recorded_at: DateTime<Utc>,
}

/// Storage abstraction so the service module can be exercised in isolation.
///
/// Implementations keep every committed snapshot (append-only) and own the settlement ledger,
/// because deleting a detail and recording its first settlement must be serialized.
pub trait CommissionRepository: Send + Sync {
    fn current(&self) -> Result<Arc<ConfigurationSnapshot>, RepositoryError>;

    fn at_revision(
        &self,
        revision: u64,
    ) -> Result<Option<Arc<ConfigurationSnapshot>>, RepositoryError>;

    /// Snapshot that was current at wall-clock `instant`.
    fn as_of(&self, instant: DateTime<Utc>) -> Result<Arc<ConfigurationSnapshot>, RepositoryError>;

    fn commit(&self, change: PendingChange) -> Result<Arc<ConfigurationSnapshot>, RepositoryError>;

    /// Persist a settlement, returning the already stored one when the transaction was settled
    /// before.
    fn record_settlement(&self, settlement: Settlement) -> Result<Settlement, RepositoryError>;

    fn settlement(&self, id: &TransactionId) -> Result<Option<Settlement>, RepositoryError>;

    fn is_detail_used(&self, id: DetailId) -> Result<bool, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("write based on revision {expected} but store is at {actual}")]
    StaleRevision { expected: u64, actual: u64 },
    #[error("another writer holds the configuration lock")]
    Contention,
    #[error("detail {0} is referenced by settled transactions")]
    DetailInUse(DetailId),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Default)]
struct SettlementLedger {
    by_transaction: BTreeMap<TransactionId, Settlement>,
    used_details: BTreeSet<DetailId>,
}

/// Process-local repository backed by an in-memory revision log.
#[derive(Debug)]
pub struct InMemoryCommissionRepository {
    history: RwLock<Vec<Arc<ConfigurationSnapshot>>>,
    ledger: Mutex<SettlementLedger>,
}

impl Default for InMemoryCommissionRepository {
    fn default() -> Self {
        Self {
            history: RwLock::new(vec![Arc::new(ConfigurationSnapshot::genesis())]),
            ledger: Mutex::new(SettlementLedger::default()),
        }
    }
}

impl InMemoryCommissionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision_count(&self) -> usize {
        self.history.read().map(|history| history.len()).unwrap_or(0)
    }

    fn latest(&self) -> Result<Arc<ConfigurationSnapshot>, RepositoryError> {
        let history = self
            .history
            .read()
            .map_err(|_| RepositoryError::Unavailable("history lock poisoned".to_string()))?;
        history
            .last()
            .cloned()
            .ok_or_else(|| RepositoryError::Unavailable("revision log is empty".to_string()))
    }
}

impl CommissionRepository for InMemoryCommissionRepository {
    fn current(&self) -> Result<Arc<ConfigurationSnapshot>, RepositoryError> {
        self.latest()
    }

    fn at_revision(
        &self,
        revision: u64,
    ) -> Result<Option<Arc<ConfigurationSnapshot>>, RepositoryError> {
        let history = self
            .history
            .read()
            .map_err(|_| RepositoryError::Unavailable("history lock poisoned".to_string()))?;
        let index = usize::try_from(revision).ok();
        Ok(index.and_then(|index| history.get(index)).cloned())
    }

    fn as_of(&self, instant: DateTime<Utc>) -> Result<Arc<ConfigurationSnapshot>, RepositoryError> {
        let history = self
            .history
            .read()
            .map_err(|_| RepositoryError::Unavailable("history lock poisoned".to_string()))?;
        // recorded_at is non-decreasing along the log and genesis sorts before every instant.
        let position = history.partition_point(|snapshot| snapshot.recorded_at <= instant);
        history
            .get(position.saturating_sub(1))
            .cloned()
            .ok_or_else(|| RepositoryError::Unavailable("revision log is empty".to_string()))
    }

    fn commit(&self, change: PendingChange) -> Result<Arc<ConfigurationSnapshot>, RepositoryError> {
        let ledger = match self.ledger.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(RepositoryError::Contention),
            Err(TryLockError::Poisoned(_)) => {
                return Err(RepositoryError::Unavailable(
                    "ledger lock poisoned".to_string(),
                ))
            }
        };

        let latest = self.latest()?;
        if latest.revision != change.base_revision {
            return Err(RepositoryError::StaleRevision {
                expected: change.base_revision,
                actual: latest.revision,
            });
        }

        let PendingChange {
            mut snapshot,
            recorded_at,
            ..
        } = change;

        if let Some(retired) = latest
            .detail_ids()
            .filter(|id| snapshot.detail(*id).is_none())
            .find(|id| ledger.used_details.contains(id))
        {
            return Err(RepositoryError::DetailInUse(retired));
        }

        snapshot.revision = latest.revision + 1;
        snapshot.recorded_at = recorded_at.max(latest.recorded_at);
        let committed = Arc::new(snapshot);

        let mut history = self
            .history
            .write()
            .map_err(|_| RepositoryError::Unavailable("history lock poisoned".to_string()))?;
        history.push(committed.clone());
        drop(history);
        drop(ledger);

        Ok(committed)
    }

    fn record_settlement(&self, settlement: Settlement) -> Result<Settlement, RepositoryError> {
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| RepositoryError::Unavailable("ledger lock poisoned".to_string()))?;

        if let Some(existing) = ledger.by_transaction.get(&settlement.transaction_id) {
            return Ok(existing.clone());
        }

        let detail_id = settlement.resolution.detail_id;
        let latest = self.latest()?;
        if latest.detail(detail_id).is_none() {
            return Err(RepositoryError::StaleRevision {
                expected: settlement.resolution.revision,
                actual: latest.revision,
            });
        }

        ledger.used_details.insert(detail_id);
        ledger
            .by_transaction
            .insert(settlement.transaction_id.clone(), settlement.clone());
        Ok(settlement)
    }

    fn settlement(&self, id: &TransactionId) -> Result<Option<Settlement>, RepositoryError> {
        let ledger = self
            .ledger
            .lock()
            .map_err(|_| RepositoryError::Unavailable("ledger lock poisoned".to_string()))?;
        Ok(ledger.by_transaction.get(id).cloned())
    }

    fn is_detail_used(&self, id: DetailId) -> Result<bool, RepositoryError> {
        let ledger = self
            .ledger
            .lock()
            .map_err(|_| RepositoryError::Unavailable("ledger lock poisoned".to_string()))?;
        Ok(ledger.used_details.contains(&id))
    }
}
