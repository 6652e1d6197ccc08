//! PDB filename convention: `<tileset-list>.<suffix>`
//!
//! spec.md §6: `<tileset-list>` is the comma-sorted decimal listing of
//! tile ids, `<suffix>` names the on-disk encoding. A leading `z` on
//! the suffix-bearing type (`zpdb`, `zbpdb`) means the blank tile is
//! appended to the tileset before the listing is formed; we instead
//! fold that into the tileset itself (callers pass a tileset that
//! already includes [`ZERO_TILE`] when they want a zero-tracked PDB)
//! and keep [`HeuristicKind`] limited to the suffix, grounded on
//! `heuristic.c`'s driver table.

use std::fmt;

use crate::error::{Error, Result};
use crate::tileset::Tileset;

/// Which on-disk encoding a PDB file uses, per `heuristic.c`'s driver
/// table. Only the two plain `struct patterndb` encodings this crate
/// implements ([`Self::Raw`], [`Self::Identified`]) can be built here;
/// [`Self::CompressedBit`] is recognized for catalogue parsing but its
/// packed format is out of scope (spec.md §1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeuristicKind {
    /// `.pdb`: one byte per entry, raw distance.
    Raw,
    /// `.ipdb`: one byte per entry, diff-encoded (spec.md §4.5).
    Identified,
    /// `.bpdb` / `.bpdb.zst`: 4-bit packed, optionally zstd-compressed.
    CompressedBit,
}

impl HeuristicKind {
    pub fn suffix(self) -> &'static str {
        match self {
            HeuristicKind::Raw => "pdb",
            HeuristicKind::Identified => "ipdb",
            HeuristicKind::CompressedBit => "bpdb",
        }
    }

    pub fn parse_suffix(s: &str) -> Result<Self> {
        match s {
            "pdb" => Ok(HeuristicKind::Raw),
            "ipdb" => Ok(HeuristicKind::Identified),
            "bpdb" | "bpdb.zst" => Ok(HeuristicKind::CompressedBit),
            other => Err(Error::Format(format!("unrecognized PDB suffix {other:?}"))),
        }
    }
}

impl fmt::Display for HeuristicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Builds the comma-sorted decimal tileset listing used in filenames,
/// e.g. `1,2,3,6,7,8`.
pub fn tileset_list_string(ts: Tileset) -> String {
    ts.to_sorted_list()
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Builds the filename `<tileset-list>.<suffix>` for `ts`/`kind`.
pub fn filename(ts: Tileset, kind: HeuristicKind) -> String {
    format!("{}.{}", tileset_list_string(ts), kind.suffix())
}

/// Parses a filename of the form `<tileset-list>.<suffix>` back into a
/// tileset and kind. The listing must be strictly ascending decimal
/// tile ids separated by commas, matching what [`tileset_list_string`]
/// produces.
pub fn parse_filename(name: &str) -> Result<(Tileset, HeuristicKind)> {
    let (list, suffix) = name
        .split_once('.')
        .ok_or_else(|| Error::Format(format!("PDB filename {name:?} has no suffix")))?;
    let kind = HeuristicKind::parse_suffix(suffix)?;

    let mut ts = Tileset::EMPTY;
    let mut last: Option<u8> = None;
    for part in list.split(',') {
        let t: u8 = part
            .parse()
            .map_err(|_| Error::Format(format!("invalid tile id {part:?} in {name:?}")))?;
        if let Some(prev) = last {
            if t <= prev {
                return Err(Error::Format(format!(
                    "tileset listing in {name:?} is not strictly ascending"
                )));
            }
        }
        last = Some(t);
        ts = ts.add(t);
    }

    Ok((ts, kind))
}
