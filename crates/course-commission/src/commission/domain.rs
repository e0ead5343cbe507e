use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::CommissionError;
use super::rate::RatePair;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Store-assigned identifier of a commission header.
    HeaderId
);
numeric_id!(
    /// Store-assigned identifier of a commission detail.
    DetailId
);
numeric_id!(CourseId);
numeric_id!(CategoryId);

/// Billing-side identifier of a completed purchase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a header. Only `Active` and `Inactive` are operator controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeaderStatus {
    #[serde(alias = "active")]
    Active,
    #[serde(alias = "inactive")]
    Inactive,
    #[serde(alias = "scheduled")]
    Scheduled,
    #[serde(alias = "expired")]
    Expired,
}

impl HeaderStatus {
    pub const fn label(self) -> &'static str {
        match self {
            HeaderStatus::Active => "ACTIVE",
            HeaderStatus::Inactive => "INACTIVE",
            HeaderStatus::Scheduled => "SCHEDULED",
            HeaderStatus::Expired => "EXPIRED",
        }
    }

    pub const fn is_operator_controlled(self) -> bool {
        matches!(self, HeaderStatus::Active | HeaderStatus::Inactive)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "scheduled" => Some(Self::Scheduled),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// Scope families ordered by specificity, least specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    General,
    Category,
    Course,
}

/// Applicability domain of a detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetailScope {
    General,
    Category { category_id: CategoryId },
    Course { course_id: CourseId },
}

impl DetailScope {
    /// Build a scope from the flattened wire representation.
    pub fn from_ids(
        course_id: Option<CourseId>,
        category_id: Option<CategoryId>,
    ) -> Result<Self, CommissionError> {
        match (course_id, category_id) {
            (None, None) => Ok(Self::General),
            (Some(course_id), None) => Ok(Self::Course { course_id }),
            (None, Some(category_id)) => Ok(Self::Category { category_id }),
            (Some(_), Some(_)) => Err(CommissionError::validation(
                "scope",
                "course_id and category_id are mutually exclusive",
            )),
        }
    }

    pub const fn kind(self) -> ScopeKind {
        match self {
            DetailScope::General => ScopeKind::General,
            DetailScope::Category { .. } => ScopeKind::Category,
            DetailScope::Course { .. } => ScopeKind::Course,
        }
    }

    pub const fn course_id(self) -> Option<CourseId> {
        match self {
            DetailScope::Course { course_id } => Some(course_id),
            _ => None,
        }
    }

    pub const fn category_id(self) -> Option<CategoryId> {
        match self {
            DetailScope::Category { category_id } => Some(category_id),
            _ => None,
        }
    }

    pub fn applies_to(self, course_id: CourseId, category_id: CategoryId) -> bool {
        match self {
            DetailScope::General => true,
            DetailScope::Category { category_id: scoped } => scoped == category_id,
            DetailScope::Course { course_id: scoped } => scoped == course_id,
        }
    }
}

/// One commission rule owned by a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionDetail {
    pub id: DetailId,
    pub header_id: HeaderId,
    pub scope: DetailScope,
    pub rate: RatePair,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommissionDetail {
    pub fn view(&self) -> DetailView {
        DetailView {
            id: self.id,
            header_id: self.header_id,
            scope: self.scope.kind(),
            course_id: self.scope.course_id(),
            category_id: self.scope.category_id(),
            platform_rate: self.rate.platform_rate(),
            instructor_rate: self.rate.instructor_rate(),
            priority: self.priority,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Named, time-bounded container owning an ordered set of details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionHeader {
    pub id: HeaderId,
    pub name: String,
    pub description: Option<String>,
    /// Last persisted status; see [`CommissionHeader::effective_status`] for the time-aware one.
    pub status: HeaderStatus,
    /// Operator INACTIVE toggle. Survives date edits and sweeps.
    pub paused: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub details: Vec<CommissionDetail>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommissionHeader {
    /// Status as observed at `at`. Dates win; inside the window only the operator toggle counts.
    pub fn effective_status(&self, at: DateTime<Utc>) -> HeaderStatus {
        if self.end_date.is_some_and(|end| at > end) {
            return HeaderStatus::Expired;
        }
        if self.start_date.is_some_and(|start| at < start) {
            return HeaderStatus::Scheduled;
        }
        if self.paused {
            HeaderStatus::Inactive
        } else {
            HeaderStatus::Active
        }
    }

    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        self.effective_status(at) == HeaderStatus::Expired
    }

    /// Whether the validity windows of two headers share at least one instant.
    pub fn window_overlaps(&self, other: &CommissionHeader) -> bool {
        let starts_before_other_ends = match (self.start_date, other.end_date) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        };
        let other_starts_before_end = match (other.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        };
        starts_before_other_ends && other_starts_before_end
    }

    pub fn detail(&self, id: DetailId) -> Option<&CommissionDetail> {
        self.details.iter().find(|detail| detail.id == id)
    }

    pub fn view(&self, at: DateTime<Utc>) -> HeaderView {
        HeaderView {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            status: self.effective_status(at),
            start_date: self.start_date,
            end_date: self.end_date,
            version: self.version,
            detail_count: self.details.len(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn view_with_details(&self, at: DateTime<Utc>) -> HeaderWithDetailsView {
        HeaderWithDetailsView {
            header: self.view(at),
            details: self.details.iter().map(CommissionDetail::view).collect(),
        }
    }
}

/// Exchange shape of a header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderView {
    pub id: HeaderId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: HeaderStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub version: u64,
    pub detail_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderWithDetailsView {
    #[serde(flatten)]
    pub header: HeaderView,
    pub details: Vec<DetailView>,
}

/// Exchange shape of a detail with the scope flattened into nullable ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailView {
    pub id: DetailId,
    pub header_id: HeaderId,
    pub scope: ScopeKind,
    pub course_id: Option<CourseId>,
    pub category_id: Option<CategoryId>,
    pub platform_rate: u8,
    pub instructor_rate: u8,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Operator input for a new header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewHeader {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

/// Partial header edit. Nullable fields use `Some(None)` to clear the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "present")]
    pub end_date: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// Operator input for a new detail. Scope is given as at most one of the two ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewDetail {
    #[serde(default)]
    pub course_id: Option<CourseId>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    pub platform_rate: i32,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Partial detail edit. Scope is immutable, so it is not accepted here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetailUpdate {
    #[serde(default)]
    pub platform_rate: Option<i32>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

fn default_true() -> bool {
    true
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
