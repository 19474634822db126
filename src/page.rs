//! Result pages
//!
//! One page of a query or scan. `next_page_token == None` is the only
//! end-of-data signal; a page may be short or empty and still have more after it.

use std::ops::Index;

use crate::value::Record;

/// A page of records plus the portable token for the page after it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultPage {
    pub records: Vec<Record>,
    pub next_page_token: Option<String>,
}

impl ResultPage {
    pub fn new(records: Vec<Record>, next_page_token: Option<String>) -> Self {
        Self {
            records,
            next_page_token,
        }
    }

    pub fn has_next_page(&self) -> bool {
        self.next_page_token.is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }
}

impl Index<usize> for ResultPage {
    type Output = Record;

    fn index(&self, i: usize) -> &Record {
        &self.records[i]
    }
}

impl IntoIterator for ResultPage {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultPage {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
