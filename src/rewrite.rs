//! The rewrite pass: replace mapped designators inside component blocks.
//!
//! Each document is read from its untouched original lines while edits land in the live copy,
//! so a swap such as `R1 -> R2, R2 -> R1` never reads an already-rewritten designator.
use std::path::PathBuf;

use crate::{
    document::{DocId, Document},
    error::RemapError,
    hierarchy::Hierarchy,
    record::{ComponentRecord, Designator},
    refmap::ReferenceMap,
    resolver::PathResolver,
};

/// One rewritten line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub path: PathBuf,
    /// 1-based
    pub line: usize,
    pub old: String,
    pub new: String,
}

/// Per-block scanner state. Reset on every `$Comp`.
#[derive(Debug)]
struct BlockState<'l> {
    part: u32,
    timestamp: &'l str,
    /// designator of the `L` record and its line
    primary: Option<(&'l str, usize)>,
    primary_hit: bool,
    authoritative_hit: Option<usize>,
    /// designators of the `AR` records met so far
    alternates: Vec<&'l str>,
    /// `AR` designators shown in the current document, confirmed at `$EndComp`
    pending: Vec<&'l str>,
}

impl<'l> BlockState<'l> {
    fn new() -> Self {
        BlockState {
            part: 1,
            timestamp: "",
            primary: None,
            primary_hit: false,
            authoritative_hit: None,
            alternates: Vec::new(),
            pending: Vec::new(),
        }
    }
}

/// Rewrite every document of `hierarchy`, confirming located parts in `map`.
pub fn rewrite_hierarchy(
    hierarchy: &mut Hierarchy,
    map: &mut ReferenceMap,
) -> Result<Vec<Rename>, RemapError> {
    let mut renames = Vec::new();
    let ids: Vec<DocId> = hierarchy.documents().ids().collect();
    for id in ids {
        let (resolver, docs) = hierarchy.split_mut();
        let doc = docs
            .get_mut(id)
            .ok_or_else(|| RemapError::Panic(format!("unknown document {id:?}")))?;
        renames.extend(rewrite_document(id, doc, &resolver, map)?);
    }
    Ok(renames)
}

/// Rewrite one document. `id` is the document's identity for path resolution.
pub fn rewrite_document(
    id: DocId,
    doc: &mut Document,
    resolver: &PathResolver<'_>,
    map: &mut ReferenceMap,
) -> Result<Vec<Rename>, RemapError> {
    let mut edits: Vec<(usize, String)> = Vec::new();
    let mut renames = Vec::new();
    {
        let path = doc.path();
        let inconsistent = |line: usize, designator: &str, reason: &str| {
            RemapError::InconsistentRecord {
                path: path.to_path_buf(),
                line: line + 1,
                designator: designator.to_string(),
                reason: reason.to_string(),
            }
        };
        let mut rename = |index: usize, line: &str, d: &Designator| {
            map.get(d.name).map(|new| {
                edits.push((index, d.replace_in(line, new)));
                renames.push(Rename {
                    path: path.to_path_buf(),
                    line: index + 1,
                    old: d.name.to_string(),
                    new: new.to_string(),
                });
            })
        };

        let mut block: Option<BlockState<'_>> = None;
        // confirmations are applied once the scan has released `map` to the rename closure
        let mut confirmations: Vec<(String, u32)> = Vec::new();

        for (index, line) in doc.original().iter().enumerate() {
            let record = ComponentRecord::parse(line, block.is_some());
            if let ComponentRecord::Begin = record {
                if let Some(open) = block.take() {
                    check_cut_short(&open, index, &inconsistent)?;
                }
                block = Some(BlockState::new());
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
                ComponentRecord::Primary(d) => {
                    state.primary = Some((d.name, index));
                    if rename(index, line.as_str(), &d).is_some() {
                        state.primary_hit = true;
                    }
                }
                ComponentRecord::Authoritative(d) => {
                    if let Some((primary, _)) = state.primary.filter(|_| state.primary_hit) {
                        if primary != d.name {
                            return Err(inconsistent(
                                index,
                                primary,
                                &format!(
                                    "appears in the 'L' record but the 'F 0' record names '{}'",
                                    d.name
                                ),
                            ));
                        }
                    }
                    if rename(index, line.as_str(), &d).is_some() {
                        state.authoritative_hit = Some(index);
                    }
                }
                ComponentRecord::Alternate {
                    path: instance_path,
                    designator,
                } => {
                    state.alternates.push(designator.name);
                    // every displayed instance shows the new name, counted or not
                    if rename(index, line.as_str(), &designator).is_some()
                        && resolver.belongs_to(instance_path, state.timestamp, id)
                    {
                        state.pending.push(designator.name);
                    }
                }
                ComponentRecord::End => {
                    let Some(state) = block.take() else {
                        continue;
                    };
                    confirmations.extend(close_block(&state, index, &inconsistent)?);
                }
                ComponentRecord::Begin | ComponentRecord::Other => {}
            }
        }

        if let Some(open) = block {
            check_cut_short(&open, doc.original().len(), &inconsistent)?;
        }

        for (designator, part) in confirmations {
            map.confirm(&designator, part)?;
        }
    }

    for (index, line) in edits {
        doc.set_line(index, line)?;
    }
    for r in &renames {
        tracing::info!(" - Replaced {} with {} in {}", r.old, r.new, r.path.display());
    }
    Ok(renames)
}

/// Validate a finished block and return the (designator, part) pairs it confirms.
fn close_block(
    state: &BlockState<'_>,
    end_index: usize,
    inconsistent: &impl Fn(usize, &str, &str) -> RemapError,
) -> Result<Vec<(String, u32)>, RemapError> {
    match (state.primary, state.primary_hit, state.authoritative_hit) {
        (Some((name, line)), true, None) => {
            return Err(inconsistent(
                line,
                name,
                "appears in an 'L' record and not in an 'F 0' record",
            ))
        }
        (primary, false, Some(line)) => {
            let name = primary.map_or("", |(name, _)| name);
            return Err(inconsistent(
                line,
                name,
                "appears in an 'F 0' record and not in an 'L' record",
            ));
        }
        _ => {}
    }

    let Some((primary, _)) = state.primary.filter(|_| state.primary_hit) else {
        // nothing renamed through L / F 0: only alternates may confirm
        return Ok(pending_confirmations(state));
    };
    if state.alternates.is_empty() {
        return Ok(vec![(primary.to_string(), state.part)]);
    }
    if !state.alternates.contains(&primary) {
        return Err(inconsistent(
            end_index,
            primary,
            "is missing from the 'AR' records of its block",
        ));
    }
    Ok(pending_confirmations(state))
}

/// A block cut short by the next `$Comp` (or the end of the file) at `index` must not have
/// renamed anything.
fn check_cut_short(
    state: &BlockState<'_>,
    index: usize,
    inconsistent: &impl Fn(usize, &str, &str) -> RemapError,
) -> Result<(), RemapError> {
    if state.primary_hit || state.authoritative_hit.is_some() || !state.pending.is_empty() {
        let designator = state.primary.map_or("", |(name, _)| name);
        return Err(inconsistent(
            index.saturating_sub(1),
            designator,
            "is inside a $Comp block that has no $EndComp",
        ));
    }
    Ok(())
}

fn pending_confirmations(state: &BlockState<'_>) -> Vec<(String, u32)> {
    state
        .pending
        .iter()
        .map(|name| (name.to_string(), state.part))
        .collect()
}
