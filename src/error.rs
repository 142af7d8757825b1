use std::{fmt, io, path::PathBuf};

use thiserror::Error;

/// Which consistency check reported a [RemapError::DesignatorCollision].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStage {
    /// Check over the untouched hierarchy.
    Before,
    /// Check over the rewritten hierarchy.
    After,
}

impl fmt::Display for CheckStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStage::Before => write!(f, "before remapping"),
            CheckStage::After => write!(f, "after remapping"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemapError {
    #[error("Cannot proceed: {} not found", .0.display())]
    MissingInput(PathBuf),
    #[error("Mapping line {line}: {kind} reference designator \"{designator}\" already listed")]
    DuplicateMapping {
        designator: String,
        /// `old` for a repeated key, `new` for a repeated replacement
        kind: &'static str,
        line: usize,
    },
    #[error("Circular sheet reference: {} is already being loaded (chain: {chain})", .path.display())]
    Cycle { path: PathBuf, chain: String },
    #[error("Inconsistency in {} at line {line}: reference designator '{designator}' {reason}", .path.display())]
    InconsistentRecord {
        path: PathBuf,
        line: usize,
        designator: String,
        reason: String,
    },
    #[error("Reference designator \"{designator}\" is not unique {stage}: {detail}")]
    DesignatorCollision {
        designator: String,
        stage: CheckStage,
        detail: String,
    },
    #[error("Reference designator '{old}' (expected to change to '{new}') {detail}")]
    IncompleteRewrite {
        old: String,
        new: String,
        detail: String,
    },
    #[error("Panic: {0}")]
    Panic(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RemapError {
    /// Process exit code reserved for this kind of failure. `-1` is left for argument errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            RemapError::MissingInput(_) => -2,
            RemapError::Io(_) => -3,
            RemapError::Cycle { .. } => -4,
            RemapError::DuplicateMapping { .. } => -5,
            RemapError::DesignatorCollision { .. } => -6,
            RemapError::InconsistentRecord { .. } => -7,
            RemapError::IncompleteRewrite { .. } => -8,
            RemapError::Panic(_) => -9,
            RemapError::Config(_) => -10,
        }
    }
}

impl From<io::Error> for RemapError {
    fn from(x: io::Error) -> Self {
        RemapError::Io(format!("IOError: {x}"))
    }
}

impl From<toml::de::Error> for RemapError {
    fn from(src: toml::de::Error) -> RemapError {
        RemapError::Config(format!("Toml deserialization error: {src}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_fatal_condition() {
        let errors = [
            RemapError::MissingInput(PathBuf::from("a.sch")),
            RemapError::Io(String::new()),
            RemapError::Cycle {
                path: PathBuf::from("a.sch"),
                chain: String::new(),
            },
            RemapError::DuplicateMapping {
                designator: "R1".to_string(),
                kind: "old",
                line: 1,
            },
            RemapError::DesignatorCollision {
                designator: "R1".to_string(),
                stage: CheckStage::Before,
                detail: String::new(),
            },
            RemapError::InconsistentRecord {
                path: PathBuf::from("a.sch"),
                line: 1,
                designator: "R1".to_string(),
                reason: String::new(),
            },
            RemapError::IncompleteRewrite {
                old: "R1".to_string(),
                new: "R2".to_string(),
                detail: String::new(),
            },
            RemapError::Panic(String::new()),
            RemapError::Config(String::new()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(RemapError::exit_code).collect();
        assert!(codes.iter().all(|c| *c < -1));
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
