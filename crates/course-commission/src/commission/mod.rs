//! Commission rule configuration and resolution.
//!
//! Headers group rate rules (details) under a validity window; the resolution engine picks
//! exactly one detail for a purchase by scope specificity, then priority. Every configuration
//! write is committed as a new immutable snapshot so past payouts can be re-derived.

pub mod clock;
pub mod domain;
pub mod error;
pub(crate) mod guard;
pub mod import;
pub mod listing;
pub mod rate;
pub mod repository;
pub mod resolution;
pub mod router;
pub mod service;
pub mod settlement;
pub mod snapshot;
pub mod stats;
pub mod sweep;

#[cfg(test)]
mod tests;

pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{
    CategoryId, CommissionDetail, CommissionHeader, CourseId, DetailId, DetailScope,
    DetailUpdate, DetailView, HeaderId, HeaderStatus, HeaderUpdate, HeaderView,
    HeaderWithDetailsView, NewDetail, NewHeader, ScopeKind, TransactionId,
};
pub use error::{CommissionError, ConflictReason};
pub use import::{ImportError, ImportSummary, SeedImporter};
pub use listing::{DetailQuery, DetailSort, HeaderQuery, HeaderSort, Page};
pub use rate::{AmountSplit, RatePair};
pub use repository::{
    CommissionRepository, InMemoryCommissionRepository, PendingChange, RepositoryError,
};
pub use resolution::{Resolution, ResolutionContext};
pub use router::{commission_router, CommissionState, ResolveRequest, StatusChange};
pub use service::{CommissionService, SweepReport};
pub use settlement::{Settlement, SettlementRequest};
pub use snapshot::ConfigurationSnapshot;
pub use stats::{CommissionStats, StatsCache};
pub use sweep::spawn_status_sweep;
