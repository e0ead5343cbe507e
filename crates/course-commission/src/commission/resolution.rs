use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    CategoryId, CommissionDetail, CourseId, DetailId, DetailScope, HeaderId, HeaderStatus,
};
use super::error::CommissionError;
use super::rate::RatePair;
use super::snapshot::ConfigurationSnapshot;

/// Transaction context a rule is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionContext {
    pub course_id: CourseId,
    pub category_id: CategoryId,
    pub at: DateTime<Utc>,
}

/// The winning rule together with the audit trail needed to reproduce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub rate: RatePair,
    pub detail_id: DetailId,
    pub header_id: HeaderId,
    pub scope: DetailScope,
    pub priority: i32,
    pub revision: u64,
}

/// Pick the single applicable detail for `context` out of `snapshot`.
///
/// Only details under headers that are ACTIVE at `context.at` compete. The most specific scope
/// wins outright; inside that scope the highest priority wins; anything left tied is reported
/// rather than broken arbitrarily.
pub fn resolve(
    snapshot: &ConfigurationSnapshot,
    context: &ResolutionContext,
) -> Result<Resolution, CommissionError> {
    let candidates = snapshot
        .headers()
        .filter(|header| header.effective_status(context.at) == HeaderStatus::Active)
        .flat_map(|header| header.details.iter())
        .filter(|detail| {
            detail.is_active
                && detail
                    .scope
                    .applies_to(context.course_id, context.category_id)
        });

    let no_rule = || CommissionError::NoApplicableRule {
        course_id: context.course_id,
        category_id: context.category_id,
        at: context.at,
    };

    let specificity = candidates
        .clone()
        .map(|detail| detail.scope.kind())
        .max()
        .ok_or_else(no_rule)?;
    let bucket: Vec<&CommissionDetail> = candidates
        .filter(|detail| detail.scope.kind() == specificity)
        .collect();

    let priority = bucket
        .iter()
        .map(|detail| detail.priority)
        .max()
        .ok_or_else(no_rule)?;
    let winners: Vec<&CommissionDetail> = bucket
        .into_iter()
        .filter(|detail| detail.priority == priority)
        .collect();

    match winners.as_slice() {
        [winner] => Ok(Resolution {
            rate: winner.rate,
            detail_id: winner.id,
            header_id: winner.header_id,
            scope: winner.scope,
            priority: winner.priority,
            revision: snapshot.revision,
        }),
        [] => Err(no_rule()),
        tied => Err(CommissionError::AmbiguousRule {
            detail_ids: tied.iter().map(|detail| detail.id).collect(),
            priority,
        }),
    }
}
