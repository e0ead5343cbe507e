use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::domain::{CommissionDetail, CommissionHeader, DetailScope};
use super::error::CommissionError;
use super::snapshot::ConfigurationSnapshot;

const MAX_NAME_LEN: usize = 120;

pub(crate) fn normalize_name(name: &str) -> Result<String, CommissionError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CommissionError::validation("name", "must not be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(CommissionError::validation(
            "name",
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

pub(crate) fn validate_window(
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
) -> Result<(), CommissionError> {
    match (start_date, end_date) {
        (Some(start), Some(end)) if start >= end => Err(CommissionError::validation(
            "end_date",
            format!("must be after start_date ({start})"),
        )),
        _ => Ok(()),
    }
}

/// A detail takes part in resolution for some instant unless it, or its header, is switched off.
/// Expired headers still count: late settlements resolve inside their window.
fn is_live(header: &CommissionHeader, detail: &CommissionDetail) -> bool {
    detail.is_active && !header.paused
}

/// Reject configurations where two live details could tie during resolution: same scope, same
/// priority, and headers whose windows overlap.
pub(crate) fn ensure_unambiguous(
    snapshot: &ConfigurationSnapshot,
) -> Result<(), CommissionError> {
    let mut groups: BTreeMap<(DetailScope, i32), Vec<(&CommissionHeader, &CommissionDetail)>> =
        BTreeMap::new();

    for header in snapshot.headers() {
        for detail in header
            .details
            .iter()
            .filter(|detail| is_live(header, detail))
        {
            groups
                .entry((detail.scope, detail.priority))
                .or_default()
                .push((header, detail));
        }
    }

    for ((_, priority), members) in groups {
        for (index, (header, detail)) in members.iter().enumerate() {
            if let Some((_, rival)) = members[index + 1..]
                .iter()
                .find(|(other_header, _)| header.window_overlaps(other_header))
            {
                return Err(CommissionError::validation(
                    "priority",
                    format!(
                        "detail {} and detail {} share scope and priority {priority} in overlapping windows",
                        detail.id, rival.id
                    ),
                ));
            }
        }
    }

    Ok(())
}
