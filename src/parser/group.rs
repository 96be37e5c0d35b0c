use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use super::extract::{extract_key, inspect, GroupKey, SkipReason};

/// Anything that can hand out plain text one page at a time.
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Text of the zero-based page `index`. `None` means nothing usable.
    fn page_text(&self, index: usize) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageGroup {
    pub key: GroupKey,
    /// Zero-based, in first-seen order.
    pub pages: Vec<usize>,
}

/// Ordered key → pages mapping. Iteration follows first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GroupTable {
    groups: Vec<PageGroup>,
    #[serde(skip)]
    index: HashMap<GroupKey, usize>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: GroupKey, page: usize) {
        match self.index.get(&key) {
            Some(&slot) => self.groups[slot].pages.push(page),
            None => {
                self.index.insert(key.clone(), self.groups.len());
                self.groups.push(PageGroup {
                    key,
                    pages: vec![page],
                });
            }
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PageGroup> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Pages across all groups.
    pub fn page_total(&self) -> usize {
        self.groups.iter().map(|g| g.pages.len()).sum()
    }
}

impl<'a> IntoIterator for &'a GroupTable {
    type Item = &'a PageGroup;
    type IntoIter = std::slice::Iter<'a, PageGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SkippedPage {
    pub page: usize,
    pub reason: SkipReason,
}

/// Everything one pass over the document found.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub page_count: usize,
    pub groups: GroupTable,
    pub skipped: Vec<SkippedPage>,
}

/// Walk every page in order, recording why each unmatched page was skipped.
pub fn scan_pages<S: PageSource + ?Sized>(source: &S) -> ScanReport {
    let page_count = source.page_count();
    let mut groups = GroupTable::new();
    let mut skipped = Vec::new();

    for page in 0..page_count {
        match page_key(source, page) {
            Ok(key) => {
                debug!(page, key = %key, "page matched");
                groups.push(key, page);
            }
            Err(reason) => {
                debug!(page, %reason, "page skipped");
                skipped.push(SkippedPage { page, reason });
            }
        }
    }

    ScanReport {
        page_count,
        groups,
        skipped,
    }
}

/// Bucket page indices by key; unmatched pages are dropped.
pub fn group_pages<S: PageSource + ?Sized>(source: &S) -> GroupTable {
    let mut groups = GroupTable::new();
    for page in 0..source.page_count() {
        if let Ok(key) = page_key(source, page) {
            groups.push(key, page);
        }
    }
    groups
}

fn page_key<S: PageSource + ?Sized>(source: &S, page: usize) -> Result<GroupKey, SkipReason> {
    let Some(text) = source.page_text(page).filter(|t| !t.trim().is_empty()) else {
        return Err(SkipReason::NoText);
    };
    match extract_key(&text) {
        Some(key) => Ok(key),
        None => Err(inspect(&text).miss_reason().unwrap_or(SkipReason::MissingBoth)),
    }
}
