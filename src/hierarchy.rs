//! Sheet hierarchy discovery.
//!
//! Starting from the root schematic, [HierarchyBuilder] follows every `$Sheet` record and loads
//! each referenced file exactly once. Each placement of a sheet gets a hierarchy path: the
//! slash-joined chain of sheet instance timestamps from the root (`""` for the root itself,
//! `"/5C8A0000"` for a sheet placed on the root, `"/5C8A0000/5C8B0000"` one level further).
//! Several paths may point at the same [Document] when a sheet is reused.
//!
//! The sheet graph is kept as a `petgraph` digraph: one node per document and one edge per
//! `$Sheet` record, labelled with the instance timestamp.
use petgraph::{graph::NodeIndex, visit::EdgeRef, Direction, Graph};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::{
    document::{DocId, Document, DocumentStore},
    error::RemapError,
    record::SheetRecord,
    resolver::PathResolver,
};

/// Hierarchy path → document shown at that path.
pub type PathIndex = BTreeMap<String, DocId>;

/// Where sheet text comes from. The file system in production, a map in tests.
pub trait SheetSource {
    fn load(&self, path: &Path) -> Result<Document, RemapError>;
}

/// Reads sheets from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystem;

impl SheetSource for FileSystem {
    fn load(&self, path: &Path) -> Result<Document, RemapError> {
        Document::load(path)
    }
}

impl SheetSource for BTreeMap<PathBuf, String> {
    fn load(&self, path: &Path) -> Result<Document, RemapError> {
        self.get(path)
            .map(|text| Document::from_text(path, text))
            .ok_or_else(|| RemapError::MissingInput(path.to_path_buf()))
    }
}

/// A `$Sheet` record: one placement of a child document inside a parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetInstance {
    pub timestamp: String,
    /// 1-based line of the `F1` record in the parent
    pub line: usize,
}

/// The loaded design: documents, the path index and the sheet graph.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    root: DocId,
    docs: DocumentStore,
    paths: PathIndex,
    sheets: Graph<DocId, SheetInstance>,
    nodes: BTreeMap<DocId, NodeIndex>,
}

impl Hierarchy {
    pub fn root(&self) -> DocId {
        self.root
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.docs
    }

    pub fn document(&self, id: DocId) -> Option<&Document> {
        self.docs.get(id)
    }

    pub fn paths(&self) -> &PathIndex {
        &self.paths
    }

    pub fn resolver(&self) -> PathResolver<'_> {
        PathResolver::new(&self.paths)
    }

    /// Resolver and mutable documents at once, for passes that rewrite while resolving.
    pub fn split_mut(&mut self) -> (PathResolver<'_>, &mut DocumentStore) {
        (PathResolver::new(&self.paths), &mut self.docs)
    }

    /// Every hierarchy path at which `id` is displayed.
    pub fn instances_of(&self, id: DocId) -> Vec<&str> {
        self.paths
            .iter()
            .filter(|(_, doc)| **doc == id)
            .map(|(path, _)| path.as_str())
            .collect()
    }

    /// Sheets placed directly inside `id`, in file order.
    pub fn sheet_children(&self, id: DocId) -> Vec<(DocId, &SheetInstance)> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut children: Vec<(DocId, &SheetInstance)> = self
            .sheets
            .edges_directed(*node, Direction::Outgoing)
            .map(|e| (self.sheets[e.target()], e.weight()))
            .collect();
        children.sort_by_key(|(_, instance)| instance.line);
        children
    }
}

/// Walks `$Sheet` records from a root schematic.
pub struct HierarchyBuilder<'s, S: SheetSource> {
    source: &'s S,
    base_dir: PathBuf,
    docs: DocumentStore,
    paths: PathIndex,
    sheets: Graph<DocId, SheetInstance>,
    nodes: BTreeMap<DocId, NodeIndex>,
    /// files currently being loaded, outermost first
    loading: Vec<PathBuf>,
}

impl HierarchyBuilder<'static, FileSystem> {
    /// Load the hierarchy rooted at `root` from disk.
    pub fn from_disk(root: &Path) -> Result<Hierarchy, RemapError> {
        static FS: FileSystem = FileSystem;
        HierarchyBuilder::new(&FS, root).build(root)
    }
}

impl<'s, S: SheetSource> HierarchyBuilder<'s, S> {
    /// Sheet file names are resolved relative to the directory of `root`.
    pub fn new(source: &'s S, root: &Path) -> Self {
        let base_dir = root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        HierarchyBuilder {
            source,
            base_dir,
            docs: DocumentStore::new(),
            paths: PathIndex::new(),
            sheets: Graph::new(),
            nodes: BTreeMap::new(),
            loading: Vec::new(),
        }
    }

    pub fn build(mut self, root: &Path) -> Result<Hierarchy, RemapError> {
        let root_id = self.load(root)?;
        self.register(String::new(), root_id)?;
        self.loading.push(root.to_path_buf());
        self.walk(root_id, "")?;
        self.loading.pop();
        tracing::debug!(
            "Hierarchy of {:?}: {} document(s), {} path(s)",
            root,
            self.docs.len(),
            self.paths.len()
        );
        Ok(Hierarchy {
            root: root_id,
            docs: self.docs,
            paths: self.paths,
            sheets: self.sheets,
            nodes: self.nodes,
        })
    }

    fn load(&mut self, path: &Path) -> Result<DocId, RemapError> {
        let doc = self.source.load(path)?;
        let id = self.docs.insert(doc)?;
        let node = self.sheets.add_node(id);
        self.nodes.insert(id, node);
        Ok(id)
    }

    fn walk(&mut self, id: DocId, prefix: &str) -> Result<(), RemapError> {
        let children = self.scan_sheets(id)?;
        let parent = self
            .docs
            .get(id)
            .map(|d| d.path().to_path_buf())
            .unwrap_or_default();
        for (timestamp, file, line) in children {
            let child_path = self.base_dir.join(&file);
            let child_key = format!("{prefix}/{timestamp}");

            if self.loading.contains(&child_path) {
                let chain = self
                    .loading
                    .iter()
                    .chain(std::iter::once(&child_path))
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(RemapError::Cycle {
                    path: child_path,
                    chain,
                });
            }

            let (child_id, reused) = match self.docs.id_of(&child_path) {
                Some(existing) => (existing, true),
                // only the root and the mapping file are inputs; an unreadable sheet is I/O
                None => {
                    let loaded = self.load(&child_path).map_err(|err| match err {
                        RemapError::MissingInput(_) | RemapError::Io(_) => {
                            RemapError::Io(format!(
                                "cannot read sheet {} referenced at line {line} of {}: {err}",
                                child_path.display(),
                                parent.display()
                            ))
                        }
                        other => other,
                    })?;
                    (loaded, false)
                }
            };
            self.add_edge(id, child_id, &timestamp, line);
            self.register(child_key.clone(), child_id)?;

            if reused {
                tracing::debug!("Sheet {:?} reused at {}", child_path, child_key);
                self.register_descendants(child_id, &child_key)?;
            } else {
                self.loading.push(child_path);
                self.walk(child_id, &child_key)?;
                self.loading.pop();
            }
        }
        Ok(())
    }

    /// Collect `(timestamp, file, line)` for each `$Sheet` record of a document.
    fn scan_sheets(&mut self, id: DocId) -> Result<Vec<(String, String, usize)>, RemapError> {
        let doc = self
            .docs
            .get_mut(id)
            .ok_or_else(|| RemapError::Panic(format!("unknown document {id:?}")))?;
        doc.mark_parsed();

        let mut found = Vec::new();
        let mut in_sheet = false;
        let mut timestamp: Option<&str> = None;
        for (index, line) in doc.lines().iter().enumerate() {
            match SheetRecord::parse(line, in_sheet) {
                SheetRecord::Begin => {
                    in_sheet = true;
                    timestamp = None;
                }
                SheetRecord::End => in_sheet = false,
                SheetRecord::Timestamp(ts) => timestamp = Some(ts),
                SheetRecord::File(file) => {
                    let ts = timestamp.ok_or_else(|| RemapError::InconsistentRecord {
                        path: doc.path().to_path_buf(),
                        line: index + 1,
                        designator: file.to_string(),
                        reason: "is a sheet file with no instance timestamp".to_string(),
                    })?;
                    found.push((ts.to_string(), file.to_string(), index + 1));
                }
                SheetRecord::Other => {}
            }
        }
        Ok(found)
    }

    fn add_edge(&mut self, parent: DocId, child: DocId, timestamp: &str, line: usize) {
        if let (Some(p), Some(c)) = (self.nodes.get(&parent), self.nodes.get(&child)) {
            self.sheets.add_edge(
                *p,
                *c,
                SheetInstance {
                    timestamp: timestamp.to_string(),
                    line,
                },
            );
        }
    }

    fn register(&mut self, key: String, id: DocId) -> Result<(), RemapError> {
        match self.paths.get(&key) {
            Some(existing) if *existing != id => Err(RemapError::InconsistentRecord {
                path: self
                    .docs
                    .get(id)
                    .map(|d| d.path().to_path_buf())
                    .unwrap_or_default(),
                line: 0,
                designator: key,
                reason: "is a hierarchy path already used by another sheet".to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                tracing::debug!("Hierarchy path '{}' -> {:?}", key, id);
                self.paths.insert(key, id);
                Ok(())
            }
        }
    }

    /// Register the paths below a reused sheet, following the already-built graph.
    fn register_descendants(&mut self, id: DocId, prefix: &str) -> Result<(), RemapError> {
        let Some(node) = self.nodes.get(&id).copied() else {
            return Ok(());
        };
        let children: Vec<(DocId, String)> = self
            .sheets
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (self.sheets[e.target()], e.weight().timestamp.clone()))
            .collect();
        for (child, timestamp) in children {
            let key = format!("{prefix}/{timestamp}");
            self.register(key.clone(), child)?;
            self.register_descendants(child, &key)?;
        }
        Ok(())
    }
}
