use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::parser::GroupKey;
use crate::pdf::SourcePdf;

pub const OUTPUT_DIR: &str = "output_pdfs";
pub const OUTPUT_SUFFIX: &str = "_signed.pdf";

/// Destination for one group of pages.
pub trait GroupSink {
    fn write_group(&mut self, key: &GroupKey, pages: &[usize]) -> Result<PathBuf>;
}

pub fn output_path(output_dir: &Path, key: &GroupKey) -> PathBuf {
    output_dir.join(format!("{}{}", key, OUTPUT_SUFFIX))
}

/// Writes each group as a subset of the loaded source PDF.
pub struct PdfGroupWriter<'a> {
    source: &'a SourcePdf,
    output_dir: PathBuf,
}

impl<'a> PdfGroupWriter<'a> {
    /// Creates `output_dir` if it doesn't exist yet.
    pub fn new(source: &'a SourcePdf, output_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;
        Ok(PdfGroupWriter {
            source,
            output_dir: output_dir.to_path_buf(),
        })
    }
}

impl GroupSink for PdfGroupWriter<'_> {
    fn write_group(&mut self, key: &GroupKey, pages: &[usize]) -> Result<PathBuf> {
        if pages.is_empty() {
            bail!("Group {} has no pages", key);
        }

        let mut numbers = Vec::with_capacity(pages.len());
        for &index in pages {
            match self.source.page_number(index) {
                Some(number) => numbers.push(number),
                None => bail!(
                    "Page index {} out of range for {} ({} pages)",
                    index,
                    self.source.path().display(),
                    self.source.page_numbers().len()
                ),
            }
        }

        let path = output_path(&self.output_dir, key);
        println!("Saving {} with {} page(s)", path.display(), pages.len());

        let mut doc = subset(self.source.document(), &numbers)?;
        debug!(group = %key, objects = doc.objects.len(), "subset built");
        doc.renumber_objects();
        doc.compress();
        doc.save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Page attributes a page may take from its ancestors in the page tree.
const INHERITABLE: &[&str] = &["Resources", "MediaBox", "CropBox", "Rotate"];

/// New document holding only `numbers` (in that order) and the objects they reach.
fn subset(source: &Document, numbers: &[u32]) -> Result<Document> {
    let page_ids = source.get_pages();
    let mut doc = Document::with_version(source.version.clone());
    doc.max_id = source.max_id;
    let pages_id = doc.new_object_id();

    let mut kids = Vec::with_capacity(numbers.len());
    let mut pending = Vec::new();
    for number in numbers {
        let Some(&page_id) = page_ids.get(number) else {
            bail!("Page {} not found", number);
        };
        let mut page = source
            .get_dictionary(page_id)
            .with_context(|| format!("Page {} is not a dictionary", number))?
            .clone();
        for key in INHERITABLE {
            if !page.has(key.as_bytes()) {
                if let Some(value) = inherited(source, &page, key.as_bytes()) {
                    page.set(*key, value);
                }
            }
        }
        page.set("Parent", pages_id);

        let page = Object::Dictionary(page);
        collect_refs(&page, &mut pending);
        doc.objects.insert(page_id, page);
        kids.push(Object::Reference(page_id));
    }

    while let Some(id) = pending.pop() {
        if doc.objects.contains_key(&id) || is_page_tree_node(source, id) {
            continue;
        }
        let Some(object) = source.objects.get(&id) else {
            continue;
        };
        collect_refs(object, &mut pending);
        doc.objects.insert(id, object.clone());
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
    Ok(doc)
}

fn inherited(source: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(|p| p.as_reference()).ok();
    // depth cap guards against a cyclic /Parent chain
    for _ in 0..64 {
        let node = source.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    None
}

/// Page and Pages nodes are only reachable through the kids we rebuild.
fn is_page_tree_node(source: &Document, id: ObjectId) -> bool {
    source
        .get_dictionary(id)
        .and_then(|d| d.get(b"Type"))
        .and_then(|t| t.as_name())
        .map(|name| name == b"Page" || name == b"Pages")
        .unwrap_or(false)
}

fn collect_refs(object: &Object, out: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => out.push(*id),
        Object::Array(items) => items.iter().for_each(|o| collect_refs(o, out)),
        Object::Dictionary(dict) => dict.iter().for_each(|(_, v)| collect_refs(v, out)),
        Object::Stream(stream) => stream.dict.iter().for_each(|(_, v)| collect_refs(v, out)),
        _ => {}
    }
}
