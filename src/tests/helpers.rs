//! Shared builders for in-memory schematics

use crate::hierarchy::{Hierarchy, HierarchyBuilder};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A component block shown without per-instance references (flat designs).
pub fn component(symbol: &str, designator: &str, part: u32, timestamp: &str) -> String {
    format!(
        "$Comp\n\
         L {symbol} {designator}\n\
         U {part} 1 {timestamp}\n\
         P 4500 3000\n\
         F 0 \"{designator}\" H 4570 3046 50  0000 L CNN\n\
         F 1 \"val\" H 4570 2955 50  0000 L CNN\n\
         \t{part}    4500 3000\n\
         \t1    0    0    -1  \n\
         $EndComp\n"
    )
}

/// A component block of a reused sheet: `shown` is the designator of the `L` / `F 0` records,
/// `instances` the `(sheet path, designator)` of each `AR` record.
pub fn instanced_component(
    symbol: &str,
    shown: &str,
    part: u32,
    timestamp: &str,
    instances: &[(&str, &str)],
) -> String {
    let alternates: String = instances
        .iter()
        .map(|(path, designator)| {
            format!("AR Path=\"{path}/{timestamp}\" Ref=\"{designator}\"  Part=\"{part}\" \n")
        })
        .collect();
    format!(
        "$Comp\n\
         L {symbol} {shown}\n\
         U {part} 1 {timestamp}\n\
         P 4500 3000\n\
         {alternates}\
         F 0 \"{shown}\" H 4570 3046 50  0000 L CNN\n\
         F 1 \"val\" H 4570 2955 50  0000 L CNN\n\
         $EndComp\n"
    )
}

/// A `$Sheet` record placing `file` with instance timestamp `timestamp`.
pub fn sheet(timestamp: &str, file: &str) -> String {
    format!(
        "$Sheet\nS 3000 2000 1000 800\nU {timestamp}\nF0 \"{file}\" 50\nF1 \"{file}\" 50\n$EndSheet\n"
    )
}

/// Wrap blocks in a schematic file header and trailer.
pub fn schematic(blocks: &[String]) -> String {
    format!(
        "EESchema Schematic File Version 4\nEELAYER 30 0\nEELAYER END\n$Descr A4 11693 8268\nComp \"\"\n$EndDescr\n{}$EndSCHEMATC\n",
        blocks.concat()
    )
}

/// Build a hierarchy rooted at `proj/<root>` from `(file name, text)` pairs.
pub fn hierarchy_of(files: &[(&str, String)], root: &str) -> Hierarchy {
    init_logging();
    let source: BTreeMap<PathBuf, String> = files
        .iter()
        .map(|(name, text)| (Path::new("proj").join(name), text.clone()))
        .collect();
    let root = Path::new("proj").join(root);
    HierarchyBuilder::new(&source, &root).build(&root).unwrap()
}

/// A single-sheet design made of `blocks`.
pub fn flat_hierarchy(blocks: &[String]) -> Hierarchy {
    hierarchy_of(&[("top.sch", schematic(blocks))], "top.sch")
}

/// Root placing `amp.sch` twice (`/0000000A` and `/0000000B`).
pub fn reused_hierarchy(amp_blocks: &[String]) -> Hierarchy {
    hierarchy_of(
        &[
            (
                "top.sch",
                schematic(&[sheet("0000000A", "amp.sch"), sheet("0000000B", "amp.sch")]),
            ),
            ("amp.sch", schematic(amp_blocks)),
        ],
        "top.sch",
    )
}

/// Live text of the document stored at `proj/<name>`.
pub fn text_of(hierarchy: &Hierarchy, name: &str) -> String {
    let id = hierarchy
        .documents()
        .id_of(&Path::new("proj").join(name))
        .unwrap();
    hierarchy.document(id).unwrap().text()
}
