//! Cursor Module
//!
//! A lazy, resumable sequence over a paged result set.
//!
//! ## Fetching
//! The cursor wraps a `fetch(page_token) -> ResultPage` function. Nothing is
//! fetched until `is_at_end`, `current` or `advance` needs a page, and each
//! page is fetched at most once. When the last record of a page is consumed
//! and the page carries a token, the page is dropped and the next one is
//! fetched on the following access.
//!
//! ## Resume Tokens
//! ```text
//! <page token or empty>@<records consumed from that page>
//! ```
//! A cursor built from a resume token fetches the page the token names and
//! skips the consumed records, landing exactly where the original cursor was.

use crate::error::{Result, TableError};
use crate::page::ResultPage;
use crate::value::Record;

const RESUME_DELIMITER: char = '@';

/// Page fetch function: page token in, page out
pub type FetchPage<'a> = Box<dyn FnMut(Option<&str>) -> Result<ResultPage> + 'a>;

/// Lazy iterator over every record of a paged query
pub struct QueryCursor<'a> {
    fetch: FetchPage<'a>,

    /// Cached page; `None` until fetched, and after its last record was consumed
    page: Option<ResultPage>,

    /// Position in `page`
    index: usize,

    /// Set when a fetch failed; the cursor yields nothing afterwards
    failed: bool,

    /// Token of the page that `page` holds (or will hold once fetched)
    pagination_token: Option<String>,

    /// Records to skip on the first fetched page (resumption)
    pending_skip: usize,

    fetches: usize,
}

impl<'a> QueryCursor<'a> {
    /// Cursor starting at the first record
    pub fn new(fetch: impl FnMut(Option<&str>) -> Result<ResultPage> + 'a) -> Self {
        Self {
            fetch: Box::new(fetch),
            page: None,
            index: 0,
            failed: false,
            pagination_token: None,
            pending_skip: 0,
            fetches: 0,
        }
    }

    /// Cursor continuing from a token produced by [`QueryCursor::resume_token`]
    pub fn resume(
        fetch: impl FnMut(Option<&str>) -> Result<ResultPage> + 'a,
        resume_token: Option<&str>,
    ) -> Result<Self> {
        let mut cursor = Self::new(fetch);
        let Some(token) = resume_token.filter(|t| !t.is_empty()) else {
            return Ok(cursor);
        };

        let (page_token, consumed) = token
            .rsplit_once(RESUME_DELIMITER)
            .ok_or_else(|| TableError::InvalidResumeToken(token.to_string()))?;
        cursor.pending_skip = consumed
            .parse()
            .map_err(|_| TableError::InvalidResumeToken(token.to_string()))?;
        cursor.pagination_token = Some(page_token.to_string()).filter(|t| !t.is_empty());
        Ok(cursor)
    }

    /// Make sure a page with an unconsumed record is cached, unless the data ran out
    fn ensure_page(&mut self) -> Result<()> {
        while self.page.is_none() {
            if self.failed {
                return Err(TableError::CursorExhausted);
            }

            tracing::trace!(token = ?self.pagination_token, "fetching page");
            let page = match (self.fetch)(self.pagination_token.as_deref()) {
                Ok(page) => page,
                Err(e) => {
                    self.failed = true;
                    return Err(e);
                }
            };
            self.fetches += 1;
            self.index = std::mem::take(&mut self.pending_skip).min(page.len());

            // Nothing left on this page but more pages follow: move on
            if self.index >= page.len() {
                if let Some(next) = &page.next_page_token {
                    self.pagination_token = Some(next.clone());
                    self.index = 0;
                    continue;
                }
            }
            self.page = Some(page);
        }
        Ok(())
    }

    /// Whether every record has been consumed
    pub fn is_at_end(&mut self) -> Result<bool> {
        if self.failed {
            return Ok(true);
        }
        self.ensure_page()?;
        Ok(match &self.page {
            Some(page) => self.index >= page.len(),
            None => true,
        })
    }

    /// The record under the cursor
    pub fn current(&mut self) -> Result<&Record> {
        if self.is_at_end()? {
            return Err(TableError::CursorExhausted);
        }
        match &self.page {
            Some(page) => Ok(&page[self.index]),
            None => Err(TableError::CursorExhausted),
        }
    }

    /// Move past the current record
    pub fn advance(&mut self) -> Result<()> {
        if self.is_at_end()? {
            return Ok(());
        }
        self.index += 1;

        let next = match &self.page {
            Some(page) if self.index >= page.len() => page.next_page_token.clone(),
            _ => None,
        };
        if let Some(next) = next {
            // Fetched lazily on the next access
            self.pagination_token = Some(next);
            self.page = None;
            self.index = 0;
        }
        Ok(())
    }

    /// Token to resume from the current position, `None` at the end
    pub fn resume_token(&mut self) -> Result<Option<String>> {
        if self.is_at_end()? {
            return Ok(None);
        }
        Ok(Some(format!(
            "{}{}{}",
            self.pagination_token.as_deref().unwrap_or(""),
            RESUME_DELIMITER,
            self.index
        )))
    }

    /// Number of pages fetched so far
    pub fn pages_fetched(&self) -> usize {
        self.fetches
    }
}

impl Iterator for QueryCursor<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let record = match self.current() {
            Ok(record) => record.clone(),
            Err(TableError::CursorExhausted) => return None,
            Err(e) => return Some(Err(e)),
        };
        match self.advance() {
            Ok(()) => Some(Ok(record)),
            Err(e) => Some(Err(e)),
        }
    }
}
