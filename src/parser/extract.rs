use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static PO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Purchase Order #:\s*([A-Za-z0-9]{8})").unwrap());
static VENDOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Vendor:\s*(.*?)\s*Ship to:").unwrap());

/// Vendor names are cut to this many characters after sanitizing.
pub const VENDOR_MAX_CHARS: usize = 50;

const FILENAME_HOSTILE: &[char] = &[' ', '/', '\\', ':'];

/// Grouping key: PO number plus sanitized vendor. Renders as `<PO>_<vendor>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GroupKey {
    pub po: String,
    pub vendor: String,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.po, self.vendor)
    }
}

/// Why a page produced no key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoText,
    MissingPo,
    MissingVendor,
    MissingBoth,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::NoText => "no text",
            SkipReason::MissingPo => "no PO number",
            SkipReason::MissingVendor => "no vendor",
            SkipReason::MissingBoth => "no PO number or vendor",
        };
        f.write_str(s)
    }
}

/// Raw per-field match result for one page.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    pub po: Option<String>,
    /// Trimmed, not yet sanitized.
    pub vendor: Option<String>,
}

impl FieldMatch {
    pub fn key(&self) -> Option<GroupKey> {
        let po = self.po.as_ref()?;
        let vendor = self.vendor.as_deref()?;
        Some(GroupKey {
            po: po.clone(),
            vendor: sanitize_vendor(vendor),
        })
    }

    /// `None` when both fields matched.
    pub fn miss_reason(&self) -> Option<SkipReason> {
        match (&self.po, &self.vendor) {
            (Some(_), Some(_)) => None,
            (None, Some(_)) => Some(SkipReason::MissingPo),
            (Some(_), None) => Some(SkipReason::MissingVendor),
            (None, None) => Some(SkipReason::MissingBoth),
        }
    }
}

pub fn inspect(text: &str) -> FieldMatch {
    let po = PO_RE.captures(text).map(|c| c[1].to_string());
    let vendor = VENDOR_RE.captures(text).map(|c| c[1].trim().to_string());
    FieldMatch { po, vendor }
}

/// Group key for a page, or `None` if either marker is missing.
pub fn extract_key(text: &str) -> Option<GroupKey> {
    inspect(text).key()
}

/// Replace filename-hostile characters with `_`, then truncate.
pub fn sanitize_vendor(vendor: &str) -> String {
    vendor
        .chars()
        .map(|c| if FILENAME_HOSTILE.contains(&c) { '_' } else { c })
        .take(VENDOR_MAX_CHARS)
        .collect()
}
