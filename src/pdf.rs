use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use lopdf::Document;
use tracing::{info, warn};

use crate::parser::PageSource;

/// A source PDF read once: lopdf objects for writing, pdf-extract text for matching.
pub struct SourcePdf {
    path: PathBuf,
    doc: Document,
    /// lopdf page numbers (1-based) in document order; slot = page index.
    page_numbers: Vec<u32>,
    texts: Vec<String>,
}

impl SourcePdf {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let source = Self::from_bytes(path, &bytes)?;
        info!("Loaded {} ({} pages)", path.display(), source.page_count());
        Ok(source)
    }

    pub fn from_bytes(path: &Path, bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes)
            .with_context(|| format!("Failed to open PDF: {}", path.display()))?;
        let page_numbers: Vec<u32> = doc.get_pages().into_keys().collect();

        // Layout-aware: word gaps between positioned runs come back as spaces.
        let texts = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| anyhow!("Failed to extract text from {}: {}", path.display(), e))?;
        if texts.len() != page_numbers.len() {
            warn!(
                "{}: {} pages but text for {}",
                path.display(),
                page_numbers.len(),
                texts.len()
            );
        }

        Ok(SourcePdf {
            path: path.to_path_buf(),
            doc,
            page_numbers,
            texts,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn page_numbers(&self) -> &[u32] {
        &self.page_numbers
    }

    pub fn page_number(&self, index: usize) -> Option<u32> {
        self.page_numbers.get(index).copied()
    }
}

impl PageSource for SourcePdf {
    fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    fn page_text(&self, index: usize) -> Option<String> {
        self.texts.get(index).cloned()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    const LINE_HEIGHT: i64 = 20;

    /// One `BT…ET` per line, each line a single `Tj`.
    fn line_ops(lines: &[&str]) -> Vec<Operation> {
        let mut ops = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            ops.push(Operation::new("BT", vec![]));
            ops.push(Operation::new("Tf", vec!["F1".into(), 10.into()]));
            ops.push(Operation::new(
                "Td",
                vec![40.into(), (800 - LINE_HEIGHT * i as i64).into()],
            ));
            ops.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            ops.push(Operation::new("ET", vec![]));
        }
        ops
    }

    /// One line whose words are separate `Tj` runs moved apart with `Td`.
    fn word_run_ops(words: &[&str], y: i64) -> Vec<Operation> {
        let mut ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Td", vec![40.into(), y.into()]),
        ];
        for (i, word) in words.iter().enumerate() {
            if i > 0 {
                ops.push(Operation::new("Td", vec![60.into(), 0.into()]));
            }
            ops.push(Operation::new("Tj", vec![Object::string_literal(*word)]));
        }
        ops.push(Operation::new("ET", vec![]));
        ops
    }

    /// Assemble pages from raw content operations. Resources sit on each page.
    fn build_pdf(pages: Vec<Vec<Operation>>) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for operations in pages {
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    pub(crate) fn invoice_pdf(pages: &[&[&str]]) -> Document {
        build_pdf(pages.iter().map(|lines| line_ops(lines)).collect())
    }

    pub(crate) fn to_bytes(mut doc: Document) -> Vec<u8> {
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    pub(crate) fn invoice_source(pages: &[&[&str]]) -> SourcePdf {
        SourcePdf::from_bytes(Path::new("batch.pdf"), &to_bytes(invoice_pdf(pages))).unwrap()
    }

    pub(crate) fn save_invoice_pdf(path: &Path, pages: &[&[&str]]) {
        invoice_pdf(pages).save(path).unwrap();
    }

    #[test]
    fn page_text_per_page() {
        let source = invoice_source(&[
            &["Purchase Order #: ABC12345", "Vendor: Acme Co Ship to: X"],
            &["Terms and conditions"],
        ]);
        assert_eq!(source.page_count(), 2);

        let first = source.page_text(0).unwrap();
        assert!(first.contains("Purchase Order #: ABC12345"), "got: {:?}", first);
        assert!(first.contains("Vendor: Acme Co Ship to: X"), "got: {:?}", first);

        let second = source.page_text(1).unwrap();
        assert!(second.contains("Terms and conditions"));
        assert!(!second.contains("Purchase Order"));
    }

    #[test]
    fn word_runs_keep_their_gaps() {
        let mut ops = line_ops(&["Purchase Order #: ABC12345"]);
        ops.extend(word_run_ops(&["Vendor:", "Acme", "Co", "Ship", "to:", "Dock"], 760));
        let bytes = to_bytes(build_pdf(vec![ops]));
        let source = SourcePdf::from_bytes(Path::new("runs.pdf"), &bytes).unwrap();

        let text = source.page_text(0).unwrap();
        let key = crate::parser::extract::extract_key(&text);
        assert_eq!(
            key.map(|k| k.to_string()).as_deref(),
            Some("ABC12345_Acme_Co"),
            "text: {:?}",
            text
        );
    }

    #[test]
    fn out_of_range_page_has_no_text() {
        let source = invoice_source(&[&["only"]]);
        assert_eq!(source.page_text(1), None);
    }

    #[test]
    fn open_reads_saved_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.pdf");
        save_invoice_pdf(&path, &[&["a"], &["b"], &["c"]]);
        let source = SourcePdf::open(&path).unwrap();
        assert_eq!(source.page_count(), 3);
        assert_eq!(source.page_number(2), Some(3));
    }

    #[test]
    fn open_missing_file_names_path() {
        let err = SourcePdf::open(Path::new("does/not/exist.pdf")).err().unwrap();
        assert!(format!("{:#}", err).contains("does/not/exist.pdf"));
    }
}
