//! In-memory schematic documents.
//!
//! Every sheet file is loaded once into a [Document] and owned by the [DocumentStore]. Sheets
//! instantiated several times in a hierarchy share the same [DocId].
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::error::RemapError;

/// Index of a [Document] inside its [DocumentStore].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocId(pub usize);

/// One schematic file held in memory.
///
/// `original` is never modified: the rewrite pass reads from it and it becomes the backup
/// contents. `lines` is the live copy that receives rewrites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    path: PathBuf,
    original: Vec<String>,
    lines: Vec<String>,
    /// terminator of each line (`"\r\n"`, `"\n"`, or `""` for a last line without one)
    endings: Vec<&'static str>,
    dirty: bool,
    parse_count: usize,
}

impl Document {
    /// Build a document from text, remembering the terminator of every line so write-back
    /// reproduces untouched lines exactly, even in files mixing `\n` and `\r\n`.
    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Self {
        let mut lines = Vec::new();
        let mut endings = Vec::new();
        for piece in text.split_inclusive('\n') {
            let (line, ending) = if let Some(line) = piece.strip_suffix("\r\n") {
                (line, "\r\n")
            } else if let Some(line) = piece.strip_suffix('\n') {
                (line, "\n")
            } else {
                (piece, "")
            };
            lines.push(line.to_string());
            endings.push(ending);
        }
        Document {
            path: path.into(),
            original: lines.clone(),
            lines,
            endings,
            dirty: false,
            parse_count: 0,
        }
    }

    pub fn load(path: &Path) -> Result<Self, RemapError> {
        tracing::debug!("Reading {:?}", path);
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RemapError::MissingInput(path.to_path_buf()),
            _ => RemapError::Io(format!("Failed to read {}: {e}", path.display())),
        })?;
        Ok(Document::from_text(path, &text))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn original(&self) -> &[String] {
        &self.original
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// How many times the sheet walker scanned this document for sheet references.
    pub fn parse_count(&self) -> usize {
        self.parse_count
    }

    pub(crate) fn mark_parsed(&mut self) {
        self.parse_count += 1;
    }

    /// Replace line `index` of the live copy and flag the document dirty.
    pub fn set_line(&mut self, index: usize, line: String) -> Result<(), RemapError> {
        let slot = self.lines.get_mut(index).ok_or_else(|| {
            RemapError::Panic(format!(
                "line {} out of range in {}",
                index + 1,
                self.path.display()
            ))
        })?;
        *slot = line;
        self.dirty = true;
        Ok(())
    }

    /// Live contents, each line followed by its original terminator.
    pub fn text(&self) -> String {
        self.join(&self.lines)
    }

    /// Untouched contents, each line followed by its original terminator.
    pub fn original_text(&self) -> String {
        self.join(&self.original)
    }

    fn join(&self, lines: &[String]) -> String {
        lines
            .iter()
            .zip(&self.endings)
            .fold(String::new(), |mut text, (line, ending)| {
                text.push_str(line);
                text.push_str(ending);
                text
            })
    }
}

/// Arena owning every loaded [Document], addressable by [DocId] or by file path.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    docs: Vec<Document>,
    by_path: BTreeMap<PathBuf, DocId>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document. Fails if a document with the same path is already stored.
    pub fn insert(&mut self, doc: Document) -> Result<DocId, RemapError> {
        if self.by_path.contains_key(doc.path()) {
            return Err(RemapError::Panic(format!(
                "document {} loaded twice",
                doc.path().display()
            )));
        }
        let id = DocId(self.docs.len());
        self.by_path.insert(doc.path().to_path_buf(), id);
        self.docs.push(doc);
        Ok(id)
    }

    pub fn id_of(&self, path: &Path) -> Option<DocId> {
        self.by_path.get(path).copied()
    }

    pub fn get(&self, id: DocId) -> Option<&Document> {
        self.docs.get(id.0)
    }

    pub fn get_mut(&mut self, id: DocId) -> Option<&mut Document> {
        self.docs.get_mut(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocId, &Document)> {
        self.docs.iter().enumerate().map(|(i, d)| (DocId(i), d))
    }

    pub fn ids(&self) -> impl Iterator<Item = DocId> {
        (0..self.docs.len()).map(DocId)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Derive the backup file name: `amp.sch` becomes `amp.<infix>.sch`.
pub fn backup_path(path: &Path, infix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}.{infix}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{infix}"),
    };
    path.with_file_name(name)
}

/// Write `text` to `path` through a sibling temp file and a rename, so a failed write never
/// leaves a truncated schematic behind.
pub fn write_atomic(path: &Path, text: &str) -> Result<(), RemapError> {
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| RemapError::Io(format!("{} has no file name", path.display())))?;
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp, text)
        .map_err(|e| RemapError::Io(format!("Failed to write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path).map_err(|e| {
        RemapError::Io(format!(
            "Failed to move {} to {}: {e}",
            tmp.display(),
            path.display()
        ))
    })?;
    tracing::debug!("Wrote {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_round_trips_line_endings() {
        for text in [
            "EESchema\n$Comp\n$EndComp\n",
            "EESchema\r\n$Comp\r\n$EndComp\r\n",
            "EESchema\n$EndSCHEMATC",
            "a\r\nb\n",
            "",
        ] {
            let doc = Document::from_text("a.sch", text);
            assert_eq!(doc.text(), text);
            assert_eq!(doc.original_text(), text);
        }
    }

    #[test]
    fn mixed_line_endings_keep_every_record() {
        let text = "EESchema\r\n$Comp\r\nL Device:R R1\nU 1 1 00000001\r\n$EndComp\n";
        let mut doc = Document::from_text("a.sch", text);
        assert_eq!(
            doc.lines(),
            ["EESchema", "$Comp", "L Device:R R1", "U 1 1 00000001", "$EndComp"]
        );
        doc.set_line(2, "L Device:R R5".to_string()).unwrap();
        assert_eq!(
            doc.text(),
            "EESchema\r\n$Comp\r\nL Device:R R5\nU 1 1 00000001\r\n$EndComp\n"
        );
        assert_eq!(doc.original_text(), text);
    }

    #[test]
    fn set_line_marks_dirty_and_keeps_original() {
        let mut doc = Document::from_text("a.sch", "L Device:R R1\nU 1 1 00000001\n");
        assert!(!doc.is_dirty());
        doc.set_line(0, "L Device:R R5".to_string()).unwrap();
        assert!(doc.is_dirty());
        assert_eq!(doc.lines()[0], "L Device:R R5");
        assert_eq!(doc.original()[0], "L Device:R R1");
        assert!(doc.set_line(7, String::new()).is_err());
    }

    #[test]
    fn store_rejects_second_copy_of_a_path() {
        let mut store = DocumentStore::new();
        let id = store.insert(Document::from_text("a.sch", "")).unwrap();
        assert_eq!(store.id_of(Path::new("a.sch")), Some(id));
        assert!(store.insert(Document::from_text("a.sch", "")).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn backup_name_inserts_infix() {
        assert_eq!(
            backup_path(Path::new("/p/amp.sch"), "orgRefMap"),
            PathBuf::from("/p/amp.orgRefMap.sch")
        );
        assert_eq!(
            backup_path(Path::new("amp"), "bak"),
            PathBuf::from("amp.bak")
        );
    }
}
