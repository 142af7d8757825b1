//! The old → new reference designator table.
//!
//! Read from a `.refRemap` file, one rule per line:
//!
//! ```text
//! R1   R105
//! U1   U9    2
//! ```
//!
//! The optional third column declares how many parts the component has. Lines that do not
//! hold at least two tokens are ignored.
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use crate::error::RemapError;

static MAP_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\S+)\s+(\S+)(?:\s+(\d+)(?:\s|$))?").unwrap());

/// Bookkeeping for one rename rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    new: String,
    /// parts already rewritten and counted
    confirmed: BTreeSet<u32>,
    expected: u32,
    declared: Option<u32>,
    /// 1-based line in the mapping file
    line: usize,
}

impl MapEntry {
    pub fn new_designator(&self) -> &str {
        &self.new
    }

    pub fn confirmed(&self) -> &BTreeSet<u32> {
        &self.confirmed
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// Confirmed parts are exactly `1..=expected`.
    pub fn is_complete(&self) -> bool {
        self.confirmed.len() == self.expected as usize
            && self.confirmed.iter().copied().eq(1..=self.expected)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceMap {
    entries: BTreeMap<String, MapEntry>,
    /// new designator → old designator, to keep replacements unique
    values: BTreeMap<String, String>,
}

impl ReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, RemapError> {
        if !path.exists() {
            return Err(RemapError::MissingInput(path.to_path_buf()));
        }
        tracing::debug!("Reading mapping file {:?}", path);
        let text = fs::read_to_string(path)
            .map_err(|e| RemapError::Io(format!("Failed to read {}: {e}", path.display())))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, RemapError> {
        let mut map = ReferenceMap::new();
        for (index, line) in text.lines().enumerate() {
            let Some(caps) = MAP_LINE.captures(line) else {
                continue;
            };
            let declared = match caps.get(3) {
                Some(m) => Some(m.as_str().parse::<u32>().map_err(|e| {
                    RemapError::Config(format!(
                        "Mapping line {}: invalid part count '{}': {e}",
                        index + 1,
                        m.as_str()
                    ))
                })?),
                None => None,
            };
            map.insert(&caps[1], &caps[2], index + 1, declared)?;
        }
        Ok(map)
    }

    /// Add a rule, rejecting a repeated old or new designator.
    pub fn insert(
        &mut self,
        old: &str,
        new: &str,
        line: usize,
        declared: Option<u32>,
    ) -> Result<(), RemapError> {
        if self.entries.contains_key(old) {
            return Err(RemapError::DuplicateMapping {
                designator: old.to_string(),
                kind: "old",
                line,
            });
        }
        if self.values.contains_key(new) {
            return Err(RemapError::DuplicateMapping {
                designator: new.to_string(),
                kind: "new",
                line,
            });
        }
        self.values.insert(new.to_string(), old.to_string());
        self.entries.insert(
            old.to_string(),
            MapEntry {
                new: new.to_string(),
                confirmed: BTreeSet::new(),
                expected: declared.unwrap_or(1),
                declared,
                line,
            },
        );
        Ok(())
    }

    /// Replacement for `old`, if `old` is a rename key.
    pub fn get(&self, old: &str) -> Option<&str> {
        self.entries.get(old).map(|e| e.new.as_str())
    }

    pub fn entry(&self, old: &str) -> Option<&MapEntry> {
        self.entries.get(old)
    }

    pub fn contains(&self, old: &str) -> bool {
        self.entries.contains_key(old)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MapEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record that `part` of `old` has been rewritten.
    ///
    /// The consistency pre-check rules out a part being met twice, so a repeat here is a
    /// [RemapError::Panic].
    pub fn confirm(&mut self, old: &str, part: u32) -> Result<(), RemapError> {
        let entry = self
            .entries
            .get_mut(old)
            .ok_or_else(|| RemapError::Panic(format!("'{old}' is not a rename key")))?;
        if !entry.confirmed.insert(part) {
            return Err(RemapError::Panic(format!(
                "part {part} of '{old}' rewritten twice"
            )));
        }
        Ok(())
    }

    /// Set the expected part count of `old` from what the hierarchy shows. A count declared in
    /// the mapping file is never lowered.
    pub fn refine(&mut self, old: &str, observed: u32) {
        if let Some(entry) = self.entries.get_mut(old) {
            entry.expected = entry.declared.map_or(observed, |d| d.max(observed));
        }
    }

    /// Every rule must have all of its parts confirmed.
    pub fn verify_complete(&self) -> Result<(), RemapError> {
        for (old, entry) in &self.entries {
            if entry.is_complete() {
                continue;
            }
            let detail = if entry.confirmed.is_empty() {
                "not found in schematics".to_string()
            } else {
                format!(
                    "found for part(s) {:?} of {} expected",
                    entry.confirmed, entry.expected
                )
            };
            return Err(RemapError::IncompleteRewrite {
                old: old.clone(),
                new: entry.new.clone(),
                detail,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ignores_non_matching_lines() {
        let map = ReferenceMap::parse("R1\tR5\n\nremap\nC3   C30  \nU1 U9 2\n").unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("R1"), Some("R5"));
        assert_eq!(map.get("C3"), Some("C30"));
        assert_eq!(map.entry("U1").unwrap().expected(), 2);
        assert_eq!(map.entry("R1").unwrap().line(), 1);
        assert!(!map.contains("remap"));
    }

    #[test]
    fn repeated_old_designator_is_rejected() {
        let err = ReferenceMap::parse("R1 R5\nR2 R6\nR1 R7\n").unwrap_err();
        assert_eq!(
            err,
            RemapError::DuplicateMapping {
                designator: "R1".to_string(),
                kind: "old",
                line: 3
            }
        );
    }

    #[test]
    fn repeated_new_designator_is_rejected() {
        let err = ReferenceMap::parse("R1 R5\nR2 R5\n").unwrap_err();
        assert_eq!(
            err,
            RemapError::DuplicateMapping {
                designator: "R5".to_string(),
                kind: "new",
                line: 2
            }
        );
    }

    #[test]
    fn swap_is_a_valid_mapping() {
        let map = ReferenceMap::parse("R1 R2\nR2 R1\n").unwrap();
        assert_eq!(map.get("R2"), Some("R1"));
    }

    #[test]
    fn completion_follows_refined_part_count() {
        let mut map = ReferenceMap::parse("U1 U9\n").unwrap();
        map.refine("U1", 2);
        map.confirm("U1", 1).unwrap();
        assert!(matches!(
            map.verify_complete(),
            Err(RemapError::IncompleteRewrite { .. })
        ));
        map.confirm("U1", 2).unwrap();
        map.verify_complete().unwrap();
        assert!(matches!(map.confirm("U1", 2), Err(RemapError::Panic(_))));
    }

    #[test]
    fn declared_part_count_is_not_lowered() {
        let mut map = ReferenceMap::parse("U1 U9 2\n").unwrap();
        map.refine("U1", 1);
        assert_eq!(map.entry("U1").unwrap().expected(), 2);
        map.refine("U1", 3);
        assert_eq!(map.entry("U1").unwrap().expected(), 3);
    }

    #[test]
    fn missing_designator_is_incomplete() {
        let map = ReferenceMap::parse("R1 R5\n").unwrap();
        let err = map.verify_complete().unwrap_err();
        assert!(err.to_string().contains("not found"), "{err}");
    }
}
