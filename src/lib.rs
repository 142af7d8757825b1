//! # refremap
//!
//! Renames component reference designators across a hierarchical KiCad (legacy `.sch`)
//! schematic, proving before and after the rename that every designator of the design owns a
//! consistent set of parts.
//!
//! ## Overview
//!
//! A project is a root schematic plus the sheets it references, possibly reusing one sheet file
//! at several places. A mapping file lists `old new` designator pairs. refremap:
//!
//! - discovers the sheet hierarchy, loading each file once ([`hierarchy`]),
//! - resolves per-instance `AR` references to the sheet placement they describe ([`resolver`]),
//! - checks that every designator has parts `1..=N` exactly once across the design ([`checker`]),
//! - rewrites the mapped designators in place ([`rewrite`]),
//! - re-checks the result and only then writes the changed sheets and their backups ([`remap`]).
//!
//! Any failure stops the run before the disk is touched.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use refremap::{config::RemapConfig, remap::Remapper};
//!
//! fn main() -> Result<(), refremap::RemapError> {
//!     // reads amp.sch (and its sheets) and amp.refRemap
//!     let mut config = RemapConfig::discover("boards/amp")?;
//!     config.dry_run = true;
//!     let report = Remapper::new(config).run()?;
//!     for rename in &report.renames {
//!         println!("{}:{} {} -> {}", rename.path.display(), rename.line, rename.old, rename.new);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## In-memory use
//!
//! The engine works on any [`hierarchy::SheetSource`]; a map of path to text is enough:
//!
//! ```rust
//! use std::{collections::BTreeMap, path::{Path, PathBuf}};
//! use refremap::{hierarchy::HierarchyBuilder, refmap::ReferenceMap, remap::remap_hierarchy};
//!
//! let sheet = "$Comp\nL Device:R R1\nU 1 1 5C8B1234\nF 0 \"R1\" H 0 0 50  0000 C CNN\n$EndComp\n";
//! let files = BTreeMap::from([(PathBuf::from("amp.sch"), sheet.to_string())]);
//! let root = Path::new("amp.sch");
//! let mut hierarchy = HierarchyBuilder::new(&files, root).build(root)?;
//! let mut map = ReferenceMap::parse("R1 R5\n")?;
//! remap_hierarchy(&mut hierarchy, &mut map)?;
//! let doc = hierarchy.document(hierarchy.root()).unwrap();
//! assert!(doc.text().contains("L Device:R R5"));
//! # Ok::<(), refremap::RemapError>(())
//! ```

pub mod checker;
pub mod config;
pub mod document;
pub mod error;
pub mod hierarchy;
pub mod record;
pub mod refmap;
pub mod remap;
pub mod resolver;
pub mod rewrite;
#[cfg(test)]
mod tests;

pub use error::*;
