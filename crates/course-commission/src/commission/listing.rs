use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    CommissionDetail, CommissionHeader, DetailView, HeaderId, HeaderStatus, HeaderView, ScopeKind,
};
use super::snapshot::ConfigurationSnapshot;

pub const DEFAULT_PER_PAGE: usize = 20;
pub const MAX_PER_PAGE: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderSort {
    #[default]
    Newest,
    Oldest,
    Name,
    StartDate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailSort {
    #[default]
    PriorityDesc,
    PriorityAsc,
    Newest,
    Oldest,
}

/// Header listing filter. `status` matches the status effective at query time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderQuery {
    pub status: Option<HeaderStatus>,
    pub sort: HeaderSort,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailQuery {
    pub header_id: Option<HeaderId>,
    pub scope: Option<ScopeKind>,
    pub is_active: Option<bool>,
    pub sort: DetailSort,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

/// One page of a listing. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    fn slice(all: Vec<T>, page: Option<usize>, per_page: Option<usize>) -> Self {
        let per_page = per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        let page = page.unwrap_or(1).max(1);
        let total = all.len();
        let total_pages = total.div_ceil(per_page);
        let items = all
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();

        Self {
            items,
            page,
            per_page,
            total,
            total_pages,
        }
    }
}

pub fn list_headers(
    snapshot: &ConfigurationSnapshot,
    query: &HeaderQuery,
    at: DateTime<Utc>,
) -> Page<HeaderView> {
    let mut headers: Vec<&CommissionHeader> = snapshot
        .headers()
        .filter(|header| {
            query
                .status
                .map_or(true, |status| header.effective_status(at) == status)
        })
        .collect();

    match query.sort {
        HeaderSort::Newest => {
            headers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)))
        }
        HeaderSort::Oldest => {
            headers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
        }
        HeaderSort::Name => headers.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        }),
        // Open-ended starts sort first: they have been in effect the longest.
        HeaderSort::StartDate => {
            headers.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)))
        }
    }

    let views = headers.into_iter().map(|header| header.view(at)).collect();
    Page::slice(views, query.page, query.per_page)
}

pub fn list_details(snapshot: &ConfigurationSnapshot, query: &DetailQuery) -> Page<DetailView> {
    let mut details: Vec<&CommissionDetail> = snapshot
        .details()
        .filter(|detail| query.header_id.map_or(true, |id| detail.header_id == id))
        .filter(|detail| query.scope.map_or(true, |scope| detail.scope.kind() == scope))
        .filter(|detail| query.is_active.map_or(true, |active| detail.is_active == active))
        .collect();

    match query.sort {
        DetailSort::PriorityDesc => {
            details.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)))
        }
        DetailSort::PriorityAsc => {
            details.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)))
        }
        DetailSort::Newest => details.sort_by(|a, b| b.id.cmp(&a.id)),
        DetailSort::Oldest => details.sort_by(|a, b| a.id.cmp(&b.id)),
    }

    let views = details.into_iter().map(CommissionDetail::view).collect();
    Page::slice(views, query.page, query.per_page)
}
