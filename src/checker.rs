//! Whole-design reference designator consistency.
//!
//! Every component block contributes one (designator, part) pair per sheet instance it is
//! displayed at. Across the design each designator must own the parts `1..=N` exactly once.
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::{Path, PathBuf},
};

use crate::{
    document::DocId,
    error::{CheckStage, RemapError},
    hierarchy::Hierarchy,
    record::ComponentRecord,
    refmap::ReferenceMap,
};

/// Designator → parts observed anywhere in the hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalReferenceIndex {
    parts: BTreeMap<String, BTreeSet<u32>>,
}

impl GlobalReferenceIndex {
    /// Returns `false` if `part` was already recorded for `designator`.
    pub fn register(&mut self, designator: &str, part: u32) -> bool {
        self.parts
            .entry(designator.to_string())
            .or_default()
            .insert(part)
    }

    pub fn parts(&self, designator: &str) -> Option<&BTreeSet<u32>> {
        self.parts.get(designator)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<u32>)> {
        self.parts.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InconsistencyKind {
    /// The same part of a designator appears twice.
    DuplicatePart { part: u32, path: PathBuf, line: usize },
    /// The parts of a designator are not `1..=N`.
    NonContiguous { parts: BTreeSet<u32> },
}

/// First designator found breaking the part invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inconsistency {
    pub designator: String,
    pub kind: InconsistencyKind,
}

impl Inconsistency {
    pub fn into_error(self, stage: CheckStage) -> RemapError {
        RemapError::DesignatorCollision {
            detail: self.to_string(),
            designator: self.designator,
            stage,
        }
    }
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            InconsistencyKind::DuplicatePart { part, path, line } => write!(
                f,
                "part {part} of '{}' met again at line {line} in {}",
                self.designator,
                path.display()
            ),
            InconsistencyKind::NonContiguous { parts } => write!(
                f,
                "'{}' has parts {parts:?}, expected 1..={}",
                self.designator,
                parts.len()
            ),
        }
    }
}

/// Scan every document of `hierarchy` and return the first inconsistency, if any.
///
/// When `map` is supplied and the design is consistent, each mapped designator found in the
/// design has its expected part count set to the number of parts observed.
pub fn check(hierarchy: &Hierarchy, map: Option<&mut ReferenceMap>) -> Option<Inconsistency> {
    let index = match build_index(hierarchy) {
        Ok(index) => index,
        Err(inconsistency) => return Some(inconsistency),
    };
    if let Some(map) = map {
        for (designator, parts) in index.iter() {
            if map.contains(designator) {
                tracing::debug!("'{}' shows {} part(s)", designator, parts.len());
                map.refine(designator, parts.len() as u32);
            }
        }
    }
    None
}

/// Build the [GlobalReferenceIndex] of the current (live) contents of `hierarchy`.
pub fn build_index(hierarchy: &Hierarchy) -> Result<GlobalReferenceIndex, Inconsistency> {
    let mut index = GlobalReferenceIndex::default();
    for id in hierarchy.documents().ids() {
        scan_document(hierarchy, id, &mut index)?;
    }
    for (designator, parts) in index.iter() {
        let contiguous = parts.iter().copied().eq(1..=parts.len() as u32);
        if !contiguous {
            return Err(Inconsistency {
                designator: designator.to_string(),
                kind: InconsistencyKind::NonContiguous {
                    parts: parts.clone(),
                },
            });
        }
    }
    Ok(index)
}

/// Registration state of the component block being scanned.
#[derive(Debug)]
struct OpenBlock<'l> {
    part: u32,
    timestamp: &'l str,
    primary: Option<(&'l str, usize)>,
    alternate_seen: bool,
    registered: bool,
}

impl<'l> OpenBlock<'l> {
    fn new() -> Self {
        OpenBlock {
            part: 1,
            timestamp: "",
            primary: None,
            alternate_seen: false,
            registered: false,
        }
    }

    /// Falls back to the `L` designator when neither `AR` nor `F 0` registered the block.
    fn close(&self, index: &mut GlobalReferenceIndex, path: &Path) -> Result<(), Inconsistency> {
        if self.alternate_seen || self.registered {
            return Ok(());
        }
        match self.primary {
            Some((name, line)) => register(index, path, name, self.part, line),
            None => Ok(()),
        }
    }
}

fn register(
    index: &mut GlobalReferenceIndex,
    path: &Path,
    designator: &str,
    part: u32,
    line: usize,
) -> Result<(), Inconsistency> {
    if index.register(designator, part) {
        Ok(())
    } else {
        Err(Inconsistency {
            designator: designator.to_string(),
            kind: InconsistencyKind::DuplicatePart {
                part,
                path: path.to_path_buf(),
                line: line + 1,
            },
        })
    }
}

fn scan_document(
    hierarchy: &Hierarchy,
    id: DocId,
    index: &mut GlobalReferenceIndex,
) -> Result<(), Inconsistency> {
    let Some(doc) = hierarchy.document(id) else {
        return Ok(());
    };
    let path = doc.path();
    let resolver = hierarchy.resolver();

    let mut block: Option<OpenBlock<'_>> = None;
    for (line_index, line) in doc.lines().iter().enumerate() {
        let record = ComponentRecord::parse(line, block.is_some());
        if let ComponentRecord::Begin = record {
            // a block without $EndComp ends where the next one starts
            if let Some(open) = block.take() {
                tracing::debug!("{:?} line {}: $Comp inside an open block", path, line_index + 1);
                open.close(index, path)?;
            }
            block = Some(OpenBlock::new());
            continue;
        }
        let Some(state) = block.as_mut() else {
            continue;
        };
        match record {
            ComponentRecord::Unit { part, timestamp } => {
                state.part = part;
                state.timestamp = timestamp;
            }
            ComponentRecord::Primary(d) => state.primary = Some((d.name, line_index)),
            ComponentRecord::Alternate {
                path: instance_path,
                designator,
            } => {
                state.alternate_seen = true;
                if resolver.belongs_to(instance_path, state.timestamp, id) {
                    register(index, path, designator.name, state.part, line_index)?;
                }
            }
            ComponentRecord::Authoritative(d) => {
                // alternates, when present, come before the field records
                if !state.alternate_seen && !state.registered {
                    register(index, path, d.name, state.part, line_index)?;
                    state.registered = true;
                }
            }
            ComponentRecord::End => {
                if let Some(open) = block.take() {
                    open.close(index, path)?;
                }
            }
            ComponentRecord::Begin | ComponentRecord::Other => {}
        }
    }
    if let Some(open) = block {
        open.close(index, path)?;
    }
    Ok(())
}
