use crate::{document::DocId, hierarchy::PathIndex};

/// Maps an alternate reference (`AR Path="..."`) to the sheet instance it describes.
///
/// An `AR` path is the hierarchy path of a sheet instance followed by the component's own unit
/// timestamp, e.g. `/5C8A0000/5C8B1234`. Stripping the component timestamp leaves the sheet
/// path (`/5C8A0000`), which the [PathIndex] maps to a document.
#[derive(Debug, Clone, Copy)]
pub struct PathResolver<'a> {
    paths: &'a PathIndex,
}

impl<'a> PathResolver<'a> {
    pub fn new(paths: &'a PathIndex) -> Self {
        PathResolver { paths }
    }

    /// Document shown at the sheet path preceding `unit_timestamp` in `alternate_path`.
    ///
    /// `None` when the timestamp does not occur in the path or when the prefix is not a path of
    /// the loaded hierarchy (the record belongs to a placement outside this design).
    pub fn resolve(&self, alternate_path: &str, unit_timestamp: &str) -> Option<DocId> {
        if unit_timestamp.is_empty() {
            return None;
        }
        let pos = alternate_path.find(unit_timestamp)?;
        let prefix = &alternate_path[..pos];
        let prefix = prefix.strip_suffix('/').unwrap_or(prefix);
        self.paths.get(prefix).copied()
    }

    /// Whether `alternate_path` describes a placement inside document `current`.
    pub fn belongs_to(&self, alternate_path: &str, unit_timestamp: &str, current: DocId) -> bool {
        self.resolve(alternate_path, unit_timestamp) == Some(current)
    }
}
