//! End-to-end remapping of a project.
//!
//! [Remapper::run] performs every verification in memory and only touches the disk once all of
//! them have passed:
//!
//! 1. load the mapping file (rejecting repeated old or new designators),
//! 2. load the sheet hierarchy,
//! 3. check designator consistency of the untouched design, learning part counts,
//! 4. rewrite mapped designators,
//! 5. check that every mapped designator had all of its parts rewritten,
//! 6. check designator consistency of the rewritten design,
//! 7. write every changed sheet together with a backup of its original contents.
use std::path::PathBuf;

use crate::{
    checker,
    config::RemapConfig,
    document::{backup_path, write_atomic},
    error::{CheckStage, RemapError},
    hierarchy::{Hierarchy, HierarchyBuilder},
    refmap::ReferenceMap,
    rewrite::{rewrite_hierarchy, Rename},
};

/// What a run did (or would have done, for a dry run).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapReport {
    /// every sheet of the hierarchy, root first
    pub documents: Vec<PathBuf>,
    pub renames: Vec<Rename>,
    /// rewritten sheets and freshly written backups
    pub written: Vec<PathBuf>,
    /// backups left in place because they already existed
    pub kept_backups: Vec<PathBuf>,
    pub dry_run: bool,
}

pub struct Remapper {
    config: RemapConfig,
}

impl Remapper {
    pub fn new(config: RemapConfig) -> Self {
        Remapper { config }
    }

    pub fn config(&self) -> &RemapConfig {
        &self.config
    }

    pub fn run(&self) -> Result<RemapReport, RemapError> {
        let schematic = self.config.schematic_path();
        let mapping = self.config.mapping_path();
        tracing::info!("Proceeds with map file: '{}'", mapping.display());
        tracing::info!(
            "Parameters: --dryrun {} --overwrite {}",
            self.config.dry_run,
            self.config.overwrite_backup
        );
        if !schematic.exists() {
            return Err(RemapError::MissingInput(schematic));
        }

        let mut map = ReferenceMap::load(&mapping)?;
        tracing::info!(
            "Mapping file checked okay to proceed ({} rule(s), no duplicate in old and new lists)",
            map.len()
        );

        let mut hierarchy = HierarchyBuilder::from_disk(&schematic)?;
        let documents: Vec<PathBuf> = hierarchy
            .documents()
            .iter()
            .map(|(_, doc)| doc.path().to_path_buf())
            .collect();
        if documents.len() < 2 {
            tracing::info!(
                "Simple schematics file (no hierarchy detected): {}",
                schematic.display()
            );
        } else {
            tracing::info!("{} schematics files found in hierarchy:", documents.len());
            log_hierarchy(&hierarchy);
        }

        let renames = remap_hierarchy(&mut hierarchy, &mut map)?;
        tracing::info!("In-memory process successful");

        let mut report = RemapReport {
            documents,
            renames,
            dry_run: self.config.dry_run,
            ..Default::default()
        };
        if self.config.dry_run {
            tracing::info!("Dry run: nothing written to disk");
        } else {
            self.persist(&hierarchy, &mut report)?;
        }
        Ok(report)
    }

    /// Write every dirty sheet, backing up its original contents first.
    fn persist(&self, hierarchy: &Hierarchy, report: &mut RemapReport) -> Result<(), RemapError> {
        for (_, doc) in hierarchy.documents().iter() {
            if !doc.is_dirty() {
                continue;
            }
            let backup = backup_path(doc.path(), &self.config.backup_infix);
            if backup.exists() && !self.config.overwrite_backup {
                tracing::warn!(
                    "Backup {} already exists, left untouched (use --overwrite to replace it)",
                    backup.display()
                );
                report.kept_backups.push(backup);
            } else {
                write_atomic(&backup, &doc.original_text())?;
                report.written.push(backup);
            }
            write_atomic(doc.path(), &doc.text())?;
            report.written.push(doc.path().to_path_buf());
            tracing::info!("{} written to disk", doc.path().display());
        }
        Ok(())
    }
}

fn log_hierarchy(hierarchy: &Hierarchy) {
    for (id, doc) in hierarchy.documents().iter() {
        tracing::info!(
            " {} (shown {} time(s))",
            doc.path().display(),
            hierarchy.instances_of(id).len()
        );
        for (child, instance) in hierarchy.sheet_children(id) {
            if let Some(child) = hierarchy.document(child) {
                tracing::debug!(
                    "   line {}: sheet {} placed as {}",
                    instance.line,
                    child.path().display(),
                    instance.timestamp
                );
            }
        }
    }
}

/// Verify, rewrite and re-verify `hierarchy` in memory according to `map`.
///
/// On success the documents of `hierarchy` hold the rewritten text and every entry of `map` is
/// complete. On failure the hierarchy must be discarded.
pub fn remap_hierarchy(
    hierarchy: &mut Hierarchy,
    map: &mut ReferenceMap,
) -> Result<Vec<Rename>, RemapError> {
    if let Some(found) = checker::check(hierarchy, Some(&mut *map)) {
        return Err(found.into_error(CheckStage::Before));
    }
    tracing::info!("Before proceeding, checked uniqueness of reference designators: okay");

    let renames = rewrite_hierarchy(hierarchy, map)?;
    map.verify_complete()?;

    if let Some(found) = checker::check(hierarchy, None) {
        return Err(found.into_error(CheckStage::After));
    }
    tracing::info!("All applied and uniqueness of reference designators after remapping is okay");
    Ok(renames)
}
