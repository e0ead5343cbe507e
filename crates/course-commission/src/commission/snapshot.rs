use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::domain::{CommissionDetail, CommissionHeader, DetailId, HeaderId};

/// Immutable view of the whole configuration at one revision.
///
/// Headers own their details; `detail_index` is the lookup from a detail back to its header and
/// is maintained by every mutator so the two never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationSnapshot {
    pub revision: u64,
    pub recorded_at: DateTime<Utc>,
    headers: BTreeMap<HeaderId, CommissionHeader>,
    detail_index: BTreeMap<DetailId, HeaderId>,
    next_header_id: u64,
    next_detail_id: u64,
}

impl Default for ConfigurationSnapshot {
    fn default() -> Self {
        Self::genesis()
    }
}

impl ConfigurationSnapshot {
    /// Empty configuration that predates every real write.
    pub fn genesis() -> Self {
        Self {
            revision: 0,
            recorded_at: DateTime::<Utc>::MIN_UTC,
            headers: BTreeMap::new(),
            detail_index: BTreeMap::new(),
            next_header_id: 1,
            next_detail_id: 1,
        }
    }

    pub fn headers(&self) -> impl Iterator<Item = &CommissionHeader> + Clone {
        self.headers.values()
    }

    pub fn header(&self, id: HeaderId) -> Option<&CommissionHeader> {
        self.headers.get(&id)
    }

    pub fn details(&self) -> impl Iterator<Item = &CommissionDetail> + Clone {
        self.headers.values().flat_map(|header| header.details.iter())
    }

    pub fn detail(&self, id: DetailId) -> Option<&CommissionDetail> {
        let header_id = self.detail_index.get(&id)?;
        self.headers.get(header_id)?.detail(id)
    }

    pub fn owner_of(&self, id: DetailId) -> Option<HeaderId> {
        self.detail_index.get(&id).copied()
    }

    pub fn detail_ids(&self) -> impl Iterator<Item = DetailId> + '_ {
        self.detail_index.keys().copied()
    }

    pub fn header_count(&self) -> usize {
        self.headers.len()
    }

    pub(crate) fn header_mut(&mut self, id: HeaderId) -> Option<&mut CommissionHeader> {
        self.headers.get_mut(&id)
    }

    pub(crate) fn headers_mut(&mut self) -> impl Iterator<Item = &mut CommissionHeader> {
        self.headers.values_mut()
    }

    pub(crate) fn next_header_id(&mut self) -> HeaderId {
        let id = HeaderId(self.next_header_id);
        self.next_header_id += 1;
        id
    }

    pub(crate) fn next_detail_id(&mut self) -> DetailId {
        let id = DetailId(self.next_detail_id);
        self.next_detail_id += 1;
        id
    }

    /// Insert a header together with whatever details it already carries.
    pub(crate) fn insert_header(&mut self, header: CommissionHeader) {
        for detail in &header.details {
            self.detail_index.insert(detail.id, header.id);
        }
        self.headers.insert(header.id, header);
    }

    pub(crate) fn remove_header(&mut self, id: HeaderId) -> Option<CommissionHeader> {
        let header = self.headers.remove(&id)?;
        for detail in &header.details {
            self.detail_index.remove(&detail.id);
        }
        Some(header)
    }

    /// Append a detail to its header. Returns `false` when the header does not exist.
    pub(crate) fn push_detail(&mut self, detail: CommissionDetail) -> bool {
        let Some(header) = self.headers.get_mut(&detail.header_id) else {
            return false;
        };
        self.detail_index.insert(detail.id, detail.header_id);
        header.details.push(detail);
        true
    }

    pub(crate) fn detail_mut(&mut self, id: DetailId) -> Option<&mut CommissionDetail> {
        let header_id = *self.detail_index.get(&id)?;
        self.headers
            .get_mut(&header_id)?
            .details
            .iter_mut()
            .find(|detail| detail.id == id)
    }

    pub(crate) fn remove_detail(&mut self, id: DetailId) -> Option<CommissionDetail> {
        let header_id = self.detail_index.remove(&id)?;
        let header = self.headers.get_mut(&header_id)?;
        let position = header.details.iter().position(|detail| detail.id == id)?;
        Some(header.details.remove(position))
    }
}
