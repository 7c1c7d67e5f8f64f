use crate::core::error::ReviewError;
use crate::models::{CandidateGroup, CandidateId, MatchCandidate};

/// A candidate admitted into the review queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCandidate {
    pub id: CandidateId,
    pub group: CandidateGroup,
    pub candidate: MatchCandidate,
}

impl QueuedCandidate {
    pub fn new(group: CandidateGroup, candidate: MatchCandidate) -> Self {
        Self {
            id: CandidateId::new(),
            group,
            candidate,
        }
    }
}

/// Read-only view of one page of the queue
#[derive(Debug, Clone, Copy)]
pub struct Page<'a> {
    /// 1-based page number after clamping
    pub number: usize,
    pub total_pages: usize,
    /// Global index of the first entry on this page
    pub offset: usize,
    pub entries: &'a [QueuedCandidate],
}

impl Page<'_> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}

/// Ordered collection of candidates awaiting review
///
/// Ambiguous candidates come first, then confident ones, each group in the
/// order the service returned it. Pages are always derived from the live
/// sequence, so a removal on one page moves the boundaries of every later
/// page by exactly one entry.
#[derive(Debug, Clone, Default)]
pub struct ReviewQueue {
    entries: Vec<QueuedCandidate>,
}

impl ReviewQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue content with `ambiguous ++ confident`
    pub fn seed(&mut self, ambiguous: Vec<MatchCandidate>, confident: Vec<MatchCandidate>) {
        self.entries.clear();
        self.entries.reserve(ambiguous.len() + confident.len());
        self.entries.extend(
            ambiguous
                .into_iter()
                .map(|c| QueuedCandidate::new(CandidateGroup::Ambiguous, c)),
        );
        self.entries.extend(
            confident
                .into_iter()
                .map(|c| QueuedCandidate::new(CandidateGroup::Confident, c)),
        );

        tracing::debug!(
            "Seeded review queue with {} entries ({} ambiguous)",
            self.entries.len(),
            self.ambiguous_remaining()
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedCandidate> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[QueuedCandidate] {
        &self.entries
    }

    pub fn ambiguous_remaining(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.group == CandidateGroup::Ambiguous)
            .count()
    }

    /// Number of pages for `page_size`; an empty queue still has one (empty) page
    pub fn total_pages(&self, page_size: usize) -> Result<usize, ReviewError> {
        if page_size == 0 {
            return Err(ReviewError::InvalidPageSize);
        }
        Ok(self.entries.len().div_ceil(page_size).max(1))
    }

    /// Return page `page_number` (1-based), clamped to `[1, total_pages]`
    pub fn page(&self, page_number: usize, page_size: usize) -> Result<Page<'_>, ReviewError> {
        let total_pages = self.total_pages(page_size)?;
        let number = page_number.clamp(1, total_pages);
        let offset = (number - 1) * page_size;
        let end = (offset + page_size).min(self.entries.len());

        Ok(Page {
            number,
            total_pages,
            offset,
            entries: &self.entries[offset.min(end)..end],
        })
    }

    pub fn get(&self, id: CandidateId) -> Option<&QueuedCandidate> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn position_of(&self, id: CandidateId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    pub fn id_at(&self, global_index: usize) -> Option<CandidateId> {
        self.entries.get(global_index).map(|e| e.id)
    }

    /// Resolve a row on a page to the candidate it shows right now
    pub fn resolve(&self, page_number: usize, page_size: usize, local_index: usize) -> Result<CandidateId, ReviewError> {
        let page = self.page(page_number, page_size)?;
        page.entries
            .get(local_index)
            .map(|e| e.id)
            .ok_or(ReviewError::IndexOutOfRange {
                index: page.offset + local_index,
                len: self.entries.len(),
            })
    }

    /// Delete the entry at `global_index`, shifting later entries down by one
    pub fn remove_at(&mut self, global_index: usize) -> Option<QueuedCandidate> {
        if global_index < self.entries.len() {
            Some(self.entries.remove(global_index))
        } else {
            None
        }
    }

    /// Delete the entry with `id`, resolving its position against the current sequence
    pub fn remove(&mut self, id: CandidateId) -> Option<(usize, QueuedCandidate)> {
        let position = self.position_of(id)?;
        self.remove_at(position).map(|entry| (position, entry))
    }

    /// Put an entry back at the front of the queue
    pub fn insert_at_head(&mut self, entry: QueuedCandidate) {
        self.entries.insert(0, entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
