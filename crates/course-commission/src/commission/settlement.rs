use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{CategoryId, CourseId, TransactionId};
use super::rate::AmountSplit;
use super::resolution::Resolution;

/// Billing request issued when a purchase is finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettlementRequest {
    pub transaction_id: TransactionId,
    pub course_id: CourseId,
    pub category_id: CategoryId,
    pub purchased_at: DateTime<Utc>,
    /// Purchase amount in minor currency units, when the caller wants the split computed.
    #[serde(default)]
    pub amount: Option<u64>,
}

/// Recorded outcome for one transaction. Billing persists this and never re-resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub transaction_id: TransactionId,
    pub resolution: Resolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split: Option<AmountSplit>,
    pub purchased_at: DateTime<Utc>,
    pub settled_at: DateTime<Utc>,
}
