use super::page_repository::{PageRepository, RevisionFilter, RevisionQuery};
use crate::domain::{entities::PageContent, value_objects::PageId, DomainResult};
use std::collections::VecDeque;

/// Number of revisions fetched per round trip unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Lazy, restartable walk over a page's revisions, newest first.
///
/// Revisions are pulled from the repository in batches as the iterator
/// advances. The walk ends after the last stored revision, or right after
/// yielding a repository error.
pub struct RevisionStream<'a, R: PageRepository> {
    repository: &'a R,
    page_id: PageId,
    filter: RevisionFilter,
    batch_size: usize,
    offset: usize,
    buffer: VecDeque<PageContent>,
    exhausted: bool,
}

impl<'a, R: PageRepository> RevisionStream<'a, R> {
    pub fn new(repository: &'a R, page_id: PageId, filter: RevisionFilter) -> Self {
        Self {
            repository,
            page_id,
            filter,
            batch_size: DEFAULT_BATCH_SIZE,
            offset: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Rewind to the newest revision. The next item is fetched fresh.
    pub fn restart(&mut self) {
        self.offset = 0;
        self.buffer.clear();
        self.exhausted = false;
    }

    /// Drain the remaining revisions, stopping at the first error
    pub fn collect_all(self) -> DomainResult<Vec<PageContent>> {
        self.collect()
    }

    fn fill_buffer(&mut self) -> DomainResult<()> {
        let query = RevisionQuery::new(self.filter.clone())
            .with_offset(self.offset)
            .with_limit(self.batch_size);

        let batch = self.repository.fetch_revisions(&self.page_id, &query)?;
        tracing::debug!(
            "Fetched {} revisions of page {} at offset {}",
            batch.len(),
            self.page_id,
            self.offset
        );

        if batch.len() < self.batch_size {
            self.exhausted = true;
        }
        self.offset += batch.len();
        self.buffer.extend(batch);
        Ok(())
    }
}

impl<R: PageRepository> Iterator for RevisionStream<'_, R> {
    type Item = DomainResult<PageContent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fill_buffer() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }

        self.buffer.pop_front().map(Ok)
    }
}
