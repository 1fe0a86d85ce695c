//! Path-based metadata inference for exported notebook pages.
//!
//! An export lays out one directory per section, one directory per page
//! inside it, and one file per paragraph:
//!
//! ```text
//! <root>/…/Notes section/Trip page/2021-03-05.md
//!          └─ section ─┘ └─ page ─┘ └─ paragraph ─┘
//! ```
//!
//! The enricher derives `section` and `page` from the two directories above
//! the file (stripping the configured suffix tokens) and turns a file named
//! after a calendar date into an ISO `date` plus a long-form `paragraph`
//! label. Any other file name becomes the `paragraph` label unchanged, with
//! an empty `date`. Directories between the export root and the section
//! directory are ignored; directories above the root never count.
//!
//! # Example
//!
//! ```rust
//! use notequery_core::enrich::{enrich, PathConvention};
//! use notequery_core::models::Document;
//!
//! let doc = Document::new("Packed bags.", "export/Notes section/Trip page/2000-01-01.md");
//! let doc = enrich(doc, &PathConvention::default()).unwrap();
//! assert_eq!(doc.meta("section"), Some("Notes"));
//! assert_eq!(doc.meta("page"), Some("Trip"));
//! assert_eq!(doc.meta("date"), Some("2000-01-01"));
//! assert_eq!(doc.meta("paragraph"), Some("Saturday, January 01, 2000"));
//! ```

use chrono::NaiveDate;

use crate::error::RagError;
use crate::models::{
    Document, META_DATE, META_PAGE, META_PARAGRAPH, META_SECTION, META_SOURCE,
};

/// Long-form label format, e.g. `Saturday, January 01, 2000`.
const PARAGRAPH_DATE_FORMAT: &str = "%A, %B %d, %Y";

/// Suffix tokens the export appends to section and page directory names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConvention {
    pub section_suffix: String,
    pub page_suffix: String,
    /// Export root the paths were loaded from. Empty means paths are
    /// already relative to the export.
    pub root: String,
}

impl Default for PathConvention {
    fn default() -> Self {
        Self {
            section_suffix: " section".to_string(),
            page_suffix: " page".to_string(),
            root: String::new(),
        }
    }
}

/// Populate `source`, `section`, `page`, `date`, and `paragraph` on a document.
///
/// # Errors
///
/// Returns [`RagError::MalformedPath`] when the path has fewer than two
/// directory levels above the file inside `convention.root`, since `section` and `page` would
/// otherwise be silently wrong. A file name that is not a date is not an
/// error.
pub fn enrich(mut document: Document, convention: &PathConvention) -> Result<Document, RagError> {
    let full = path_segments(&document.source_path);
    let root = path_segments(&convention.root);
    let segments = full.strip_prefix(root.as_slice()).unwrap_or(&full);

    if segments.len() < 3 {
        return Err(RagError::MalformedPath {
            path: document.source_path.clone(),
            reason: format!(
                "expected <section dir>/<page dir>/<paragraph file>, found {} segment(s)",
                segments.len()
            ),
        });
    }

    let file_name = segments[segments.len() - 1];
    let page_dir = segments[segments.len() - 2];
    let section_dir = segments[segments.len() - 3];

    let stem = file_stem(file_name);
    let page = strip_token(page_dir, &convention.page_suffix);
    let section = strip_token(section_dir, &convention.section_suffix);

    let (date, paragraph) = match parse_paragraph_date(stem) {
        Some(d) => (
            d.format("%Y-%m-%d").to_string(),
            d.format(PARAGRAPH_DATE_FORMAT).to_string(),
        ),
        None => {
            tracing::debug!(file = stem, "paragraph name is not a date; using it as the label");
            (String::new(), stem.to_string())
        }
    };

    let source = document.source_path.clone();
    let meta = &mut document.metadata;
    meta.insert(META_SOURCE.to_string(), source);
    meta.insert(META_SECTION.to_string(), section.to_string());
    meta.insert(META_PAGE.to_string(), page.to_string());
    meta.insert(META_DATE.to_string(), date);
    meta.insert(META_PARAGRAPH.to_string(), paragraph);

    Ok(document)
}

/// Enrich every document, stopping at the first malformed path.
pub fn enrich_all(
    documents: Vec<Document>,
    convention: &PathConvention,
) -> Result<Vec<Document>, RagError> {
    documents
        .into_iter()
        .map(|d| enrich(d, convention))
        .collect()
}

/// Parse a strict `YYYY-MM-DD` name into a calendar date.
///
/// The shape is checked before parsing so that looser spellings such as
/// `2021-3-5` or `2021-03-05 notes` are treated as plain labels.
pub fn parse_paragraph_date(name: &str) -> Option<NaiveDate> {
    let bytes = name.as_bytes();
    if bytes.len() != 10 {
        return None;
    }
    let shape_ok = bytes.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        _ => b.is_ascii_digit(),
    });
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(name, "%Y-%m-%d").ok()
}

fn path_segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

fn file_stem(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(pos) => &file_name[..pos],
    }
}

fn strip_token<'a>(name: &'a str, suffix: &str) -> &'a str {
    if suffix.is_empty() {
        return name;
    }
    name.strip_suffix(suffix).unwrap_or(name)
}
