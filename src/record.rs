//! Line-level records of the KiCad legacy schematic format.
//!
//! A schematic is scanned line by line. Only the records needed for reference-designator
//! bookkeeping are recognised; every other line is [`ComponentRecord::Other`] /
//! [`SheetRecord::Other`] and passes through untouched.
//!
//! ```text
//! $Comp
//! L Device:R R1                          <- primary reference
//! U 1 1 5C8B1234                         <- unit record: part, convert, timestamp
//! P 4500 3000
//! AR Path="/5C8A0000/5C8B1234" Ref="R1"  Part="1"   <- alternate reference (one per instance)
//! F 0 "R1" H 4500 2800 50  0000 C CNN   <- authoritative reference
//! $EndComp
//!
//! $Sheet
//! S 3000 2000 1000 800
//! U 5C8A0000                             <- sheet instance timestamp
//! F0 "Amplifier" 50
//! F1 "amp.sch" 50                        <- referenced file
//! $EndSheet
//! ```
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static COMP_BEGIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\$Comp\s*$").unwrap());
static COMP_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\$EndComp\s*$").unwrap());
static UNIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^U\s+(\d+)\s+(\S+)\s+(\S+)\s*$").unwrap());
static PRIMARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^L\s+(\S+)\s+(\S+)\s*$").unwrap());
// the first separator is \s* rather than \s+ to tolerate "F0" spellings
static AUTHORITATIVE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^F\s*0\s+"(\S+)"(.*)$"#).unwrap());
static ALTERNATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^AR\s+Path="(\S*)"\s+Ref="(\S+)"(.*)$"#).unwrap());

static SHEET_BEGIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\$Sheet\s*$").unwrap());
static SHEET_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\$EndSheet\s*$").unwrap());
static SHEET_TIMESTAMP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^U\s+(\S+)\s*$").unwrap());
static SHEET_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^F1\s+"(\S+)""#).unwrap());

/// A designator occurrence inside a line: its text and byte span.
///
/// Rewriting replaces only the span, so every other byte of the line is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Designator<'a> {
    pub name: &'a str,
    pub span: Range<usize>,
}

impl<'a> Designator<'a> {
    fn from_match(m: regex::Match<'a>) -> Self {
        Designator {
            name: m.as_str(),
            span: m.range(),
        }
    }

    /// Returns `line` with this designator replaced by `new_name`.
    pub fn replace_in(&self, line: &str, new_name: &str) -> String {
        let mut out = String::with_capacity(line.len() + new_name.len());
        out.push_str(&line[..self.span.start]);
        out.push_str(new_name);
        out.push_str(&line[self.span.end..]);
        out
    }
}

/// Records that matter inside (or delimiting) a `$Comp ... $EndComp` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentRecord<'a> {
    Begin,
    End,
    Unit { part: u32, timestamp: &'a str },
    Primary(Designator<'a>),
    Authoritative(Designator<'a>),
    Alternate { path: &'a str, designator: Designator<'a> },
    Other,
}

impl<'a> ComponentRecord<'a> {
    /// Classify one line. `in_block` selects whether block content records are recognised;
    /// outside a block only the begin marker is meaningful.
    pub fn parse(line: &'a str, in_block: bool) -> Self {
        if COMP_BEGIN.is_match(line) {
            return ComponentRecord::Begin;
        }
        if !in_block {
            return ComponentRecord::Other;
        }
        if COMP_END.is_match(line) {
            return ComponentRecord::End;
        }
        if let Some(caps) = UNIT.captures(line) {
            // the regex guarantees digits; only an absurdly long part number can fail here
            if let Ok(part) = caps[1].parse::<u32>() {
                let timestamp = caps.get(3).map_or("", |m| m.as_str());
                return ComponentRecord::Unit { part, timestamp };
            }
            return ComponentRecord::Other;
        }
        if let Some(m) = PRIMARY.captures(line).and_then(|c| c.get(2)) {
            return ComponentRecord::Primary(Designator::from_match(m));
        }
        if let Some(m) = AUTHORITATIVE.captures(line).and_then(|c| c.get(1)) {
            return ComponentRecord::Authoritative(Designator::from_match(m));
        }
        if let Some(caps) = ALTERNATE.captures(line) {
            if let (Some(path), Some(m)) = (caps.get(1), caps.get(2)) {
                return ComponentRecord::Alternate {
                    path: path.as_str(),
                    designator: Designator::from_match(m),
                };
            }
        }
        ComponentRecord::Other
    }
}

/// Records that matter inside (or delimiting) a `$Sheet ... $EndSheet` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetRecord<'a> {
    Begin,
    End,
    Timestamp(&'a str),
    File(&'a str),
    Other,
}

impl<'a> SheetRecord<'a> {
    pub fn parse(line: &'a str, in_block: bool) -> Self {
        if !in_block {
            return if SHEET_BEGIN.is_match(line) {
                SheetRecord::Begin
            } else {
                SheetRecord::Other
            };
        }
        if SHEET_END.is_match(line) {
            return SheetRecord::End;
        }
        if let Some(m) = SHEET_TIMESTAMP.captures(line).and_then(|c| c.get(1)) {
            return SheetRecord::Timestamp(m.as_str());
        }
        if let Some(m) = SHEET_FILE.captures(line).and_then(|c| c.get(1)) {
            return SheetRecord::File(m.as_str());
        }
        SheetRecord::Other
    }
}
