//! PDB catalogues and the partial-h-value engine
//!
//! A catalogue (spec.md §4.6) names a set of PDBs and groups them into
//! heuristics: within a group, the member PDBs' tilesets must
//! partition the non-blank tiles disjointly, so summing their values
//! stays admissible. The overall heuristic is the best (maximum) sum
//! over all groups. `catalogue.c` itself isn't among the retrieved
//! sources, only `catalogue.h`'s field semantics (`n_pdbs <= 64`,
//! `n_heuristics <= 32`, `parts[h]` a 64-bit group bitmap) — the text
//! format parsed below is this crate's own design against that header.

use std::fs::File;
use std::io::BufRead;
use std::path::Path;

use crate::config::CatalogueLoadConfig;
use crate::error::{Error, Result};
use crate::index::{compute_index, IndexAux};
use crate::pdb::filename::{parse_filename, HeuristicKind};
use crate::pdb::{identify, MapMode, PatternDb};
use crate::puzzle::{Puzzle, ZERO_TILE};
use crate::tileset::Tileset;

/// Upper bound on distinct PDBs a catalogue may reference.
pub const CATALOGUE_PDBS_LEN: usize = 64;

/// Upper bound on distinct heuristic groups a catalogue may define.
pub const HEURISTICS_LEN: usize = 32;

/// Maximum accepted catalogue file line length.
pub const MAX_LINE_LEN: usize = 4096;

struct LoadedPdb {
    db: PatternDb,
    identified: bool,
}

/// A loaded set of PDBs and the heuristic groups built from them.
pub struct Catalogue {
    pdbs: Vec<LoadedPdb>,
    /// `parts[g]` is a bitmap over `pdbs`: bit `i` set means PDB `i`
    /// belongs to group `g`.
    parts: Vec<u64>,
}

/// Scratchpad of the latest per-PDB lookup for one puzzle state,
/// reused across moves via [`Catalogue::diff_hvals`] to skip PDBs a
/// move didn't affect.
#[derive(Debug, Clone)]
pub struct PartialHVals {
    hvals: Vec<u8>,
}

impl Catalogue {
    pub fn n_pdbs(&self) -> usize {
        self.pdbs.len()
    }

    pub fn n_heuristics(&self) -> usize {
        self.parts.len()
    }

    /// Parses and loads a catalogue file. `heudir` is the directory
    /// PDB files named by the catalogue are resolved against.
    pub fn load(
        catalogue_path: impl AsRef<Path>,
        heudir: impl AsRef<Path>,
        config: CatalogueLoadConfig,
    ) -> Result<Self> {
        let text = File::open(catalogue_path.as_ref())?;
        let spec = parse_catalogue_text(std::io::BufReader::new(text))?;
        Self::from_parsed(spec, heudir.as_ref(), config)
    }

    fn from_parsed(spec: ParsedCatalogue, heudir: &Path, config: CatalogueLoadConfig) -> Result<Self> {
        if spec.pdbs.len() > CATALOGUE_PDBS_LEN {
            return Err(Error::Format(format!(
                "catalogue names {} PDBs, limit is {CATALOGUE_PDBS_LEN}",
                spec.pdbs.len()
            )));
        }
        if spec.groups.len() > HEURISTICS_LEN {
            return Err(Error::Format(format!(
                "catalogue has {} heuristic groups, limit is {HEURISTICS_LEN}",
                spec.groups.len()
            )));
        }

        let mut pdbs = Vec::with_capacity(spec.pdbs.len());
        for decl in &spec.pdbs {
            if config.verbose {
                eprintln!(
                    "Loading PDB for tile set {}",
                    crate::pdb::filename::tileset_list_string(decl.ts)
                );
            }
            pdbs.push(load_one_pdb(decl.ts, decl.kind, heudir, config)?);
        }

        let parts = spec
            .groups
            .iter()
            .map(|members| members.iter().fold(0u64, |bits, &i| bits | (1u64 << i)))
            .collect();

        Ok(Catalogue { pdbs, parts })
    }

    /// Full evaluation: looks up every PDB and returns the best group
    /// sum, filling `ph` with each PDB's raw contribution.
    pub fn partial_hvals(&self, ph: &mut PartialHVals, p: &Puzzle) -> u32 {
        ph.hvals.resize(self.pdbs.len(), 0);
        for (i, pdb) in self.pdbs.iter().enumerate() {
            ph.hvals[i] = pdb.db.lookup_puzzle(p);
        }
        self.group_max_sum(ph)
    }

    /// Convenience one-shot wrapper around [`Self::partial_hvals`].
    pub fn hval(&self, p: &Puzzle) -> u32 {
        let mut ph = PartialHVals::new(self.pdbs.len());
        self.partial_hvals(&mut ph, p)
    }

    /// Incremental update after a single move of `moved_tile` (the
    /// non-blank tile that traded places with the blank). PDBs whose
    /// tileset contains `moved_tile` are recomputed in full — the
    /// pattern itself changed. PDBs that track the blank but not
    /// `moved_tile` only had their blank equivalence class change: an
    /// identified PDB answers that from one extra table read via
    /// [`identify::diff_lookup`], otherwise it falls back to a full
    /// lookup. PDBs that track neither keep their cached value.
    pub fn diff_hvals(
        &self,
        ph: &mut PartialHVals,
        old_p: &Puzzle,
        new_p: &Puzzle,
        moved_tile: u8,
    ) -> u32 {
        ph.hvals.resize(self.pdbs.len(), 0);
        for (i, pdb) in self.pdbs.iter().enumerate() {
            let ts = pdb.db.aux.ts;
            let tracks_moved = ts.contains(moved_tile);
            let tracks_zero = ts.contains(ZERO_TILE);

            if tracks_moved {
                ph.hvals[i] = pdb.db.lookup_puzzle(new_p);
            } else if tracks_zero {
                if pdb.identified {
                    let old_idx = compute_index(&pdb.db.aux, old_p);
                    let new_idx = compute_index(&pdb.db.aux, new_p);
                    ph.hvals[i] = identify::diff_lookup(&pdb.db, &old_idx, &new_idx, ph.hvals[i]);
                } else {
                    ph.hvals[i] = pdb.db.lookup_puzzle(new_p);
                }
            }
            // else: neither the pattern nor the blank matters to this
            // PDB, previous value in ph.hvals[i] still holds.
        }
        self.group_max_sum(ph)
    }

    fn group_max_sum(&self, ph: &PartialHVals) -> u32 {
        let mut max = 0u32;
        for bits in &self.parts {
            max = max.max(sum_over_bits(*bits, ph));
        }
        max
    }

    /// Bitmap of the heuristic groups achieving the maximum sum for
    /// `ph` (spec.md §4.6's `catalogue_max_heuristics`).
    pub fn max_heuristics(&self, ph: &PartialHVals) -> u32 {
        let mut max = 0u32;
        let mut heumap = 0u32;
        for (g, bits) in self.parts.iter().enumerate() {
            let sum = sum_over_bits(*bits, ph);
            if sum > max {
                max = sum;
                heumap = 0;
            }
            if sum == max {
                heumap |= 1 << g;
            }
        }
        heumap
    }
}

fn sum_over_bits(bits: u64, ph: &PartialHVals) -> u32 {
    let mut sum = 0u32;
    let mut remaining = bits;
    while remaining != 0 {
        let i = remaining.trailing_zeros() as usize;
        sum += ph.hvals[i] as u32;
        remaining &= remaining - 1;
    }
    sum
}

impl PartialHVals {
    pub fn new(n_pdbs: usize) -> Self {
        PartialHVals {
            hvals: vec![0; n_pdbs],
        }
    }
}

fn load_one_pdb(
    ts: Tileset,
    kind: HeuristicKind,
    heudir: &Path,
    config: CatalogueLoadConfig,
) -> Result<LoadedPdb> {
    if kind == HeuristicKind::CompressedBit {
        return Err(Error::Format(
            "compressed bitpdb PDBs are not supported by this build".into(),
        ));
    }

    let path = heudir.join(crate::pdb::filename::filename(ts, kind));

    // A raw PDB the caller wants identified has to come in as a heap
    // copy: identification rewrites every cell, which a read-only
    // mapping can't do.
    if kind == HeuristicKind::Raw && config.identify && ts.contains(ZERO_TILE) {
        let aux = IndexAux::new(ts)?;
        let mut file = File::open(&path)?;
        let mut db = PatternDb::load(aux, &mut file)?;
        identify::identify(&mut db)?;
        return Ok(LoadedPdb {
            db,
            identified: true,
        });
    }

    let aux = IndexAux::new(ts)?;
    let file = File::open(&path)?;
    let db = PatternDb::mmap(aux, &file, MapMode::ReadOnly)?;

    Ok(LoadedPdb {
        db,
        identified: kind == HeuristicKind::Identified,
    })
}

struct PdbDecl {
    ts: Tileset,
    kind: HeuristicKind,
}

struct ParsedCatalogue {
    pdbs: Vec<PdbDecl>,
    groups: Vec<Vec<usize>>,
}

/// Parses the catalogue text format: blank lines and `#` comments are
/// skipped; a declaration line is `<tileset-list> <suffix>`; a `=N`
/// line assigns the most recently declared PDB to group `N`,
/// allocating the group if it doesn't exist yet. Declaring the same
/// `(tileset, kind)` twice reuses the existing PDB slot instead of
/// duplicating it.
fn parse_catalogue_text<R: BufRead>(reader: R) -> Result<ParsedCatalogue> {
    let mut pdbs: Vec<PdbDecl> = Vec::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut last_pdb: Option<usize> = None;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.len() > MAX_LINE_LEN {
            return Err(Error::Format(format!(
                "catalogue line {} exceeds {MAX_LINE_LEN} bytes",
                lineno + 1
            )));
        }

        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(group_str) = line.strip_prefix('=') {
            let group: usize = group_str.trim().parse().map_err(|_| {
                Error::Format(format!(
                    "catalogue line {}: invalid group id {group_str:?}",
                    lineno + 1
                ))
            })?;
            let pdb_idx = last_pdb.ok_or_else(|| {
                Error::Format(format!(
                    "catalogue line {}: group marker with no preceding PDB declaration",
                    lineno + 1
                ))
            })?;
            while groups.len() <= group {
                groups.push(Vec::new());
            }
            if !groups[group].contains(&pdb_idx) {
                groups[group].push(pdb_idx);
            }
            continue;
        }

        let mut parts = line.split_whitespace();
        let list = parts
            .next()
            .ok_or_else(|| Error::Format(format!("catalogue line {}: missing tileset list", lineno + 1)))?;
        let suffix = parts
            .next()
            .ok_or_else(|| Error::Format(format!("catalogue line {}: missing PDB type", lineno + 1)))?;
        if parts.next().is_some() {
            return Err(Error::Format(format!("catalogue line {}: too many fields", lineno + 1)));
        }

        let dummy_name = format!("{list}.{suffix}");
        let (ts, kind) = parse_filename(&dummy_name).map_err(|_| {
            Error::Format(format!(
                "catalogue line {}: invalid PDB declaration {line:?}",
                lineno + 1
            ))
        })?;

        let existing = pdbs.iter().position(|d| d.ts == ts && d.kind == kind);
        let idx = match existing {
            Some(i) => i,
            None => {
                pdbs.push(PdbDecl { ts, kind });
                pdbs.len() - 1
            }
        };
        last_pdb = Some(idx);
    }

    Ok(ParsedCatalogue { pdbs, groups })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalogue_skips_blanks_and_comments() {
        let text = "# a comment\n\n1,2,3 pdb\n=0\n";
        let parsed = parse_catalogue_text(std::io::Cursor::new(text)).unwrap();
        assert_eq!(parsed.pdbs.len(), 1);
        assert_eq!(parsed.groups.len(), 1);
        assert_eq!(parsed.groups[0], vec![0]);
    }

    #[test]
    fn test_parse_catalogue_dedups_identical_pdbs() {
        let text = "1,2,3 pdb\n=0\n1,2,3 pdb\n=1\n";
        let parsed = parse_catalogue_text(std::io::Cursor::new(text)).unwrap();
        assert_eq!(parsed.pdbs.len(), 1);
        assert_eq!(parsed.groups.len(), 2);
        assert_eq!(parsed.groups[0], vec![0]);
        assert_eq!(parsed.groups[1], vec![0]);
    }

    #[test]
    fn test_parse_catalogue_rejects_group_without_pdb() {
        let text = "=0\n";
        assert!(parse_catalogue_text(std::io::Cursor::new(text)).is_err());
    }

    #[test]
    fn test_parse_catalogue_rejects_malformed_line() {
        let text = "1,2,3\n";
        assert!(parse_catalogue_text(std::io::Cursor::new(text)).is_err());
    }

    #[test]
    fn test_group_max_sum_picks_best_group() {
        let cat = Catalogue {
            pdbs: Vec::new(),
            parts: vec![0b01, 0b10, 0b11],
        };
        let ph = PartialHVals { hvals: vec![3, 5] };
        assert_eq!(cat.group_max_sum(&ph), 8);
    }

    #[test]
    fn test_max_heuristics_reports_all_ties() {
        let cat = Catalogue {
            pdbs: Vec::new(),
            parts: vec![0b01, 0b10],
        };
        let ph = PartialHVals { hvals: vec![4, 4] };
        assert_eq!(cat.max_heuristics(&ph), 0b11);
    }

    #[test]
    fn test_max_heuristics_breaks_on_strict_improvement() {
        let cat = Catalogue {
            pdbs: Vec::new(),
            parts: vec![0b01, 0b10, 0b100],
        };
        let ph = PartialHVals {
            hvals: vec![1, 2, 9],
        };
        assert_eq!(cat.max_heuristics(&ph), 0b100);
    }

    /// Builds two disjoint, non-blank-tracked PDBs on disk under
    /// `dir`, for tilesets {1,2,3} and {4,5,6}, and returns their
    /// filenames (for building a catalogue declaration).
    fn write_sample_pdbs(dir: &std::path::Path) -> (Tileset, Tileset) {
        let ts_a = Tileset::from_tiles([1, 2, 3]);
        let ts_b = Tileset::from_tiles([4, 5, 6]);
        for ts in [ts_a, ts_b] {
            let aux = IndexAux::new(ts).unwrap();
            let (db, _) =
                crate::pdb::generator::generate(aux, crate::config::GenerationConfig::with_jobs(2)).unwrap();
            let path = dir.join(crate::pdb::filename::filename(ts, HeuristicKind::Raw));
            let mut file = File::create(path).unwrap();
            db.store(&mut file).unwrap();
        }
        (ts_a, ts_b)
    }

    fn scramble(choices: &[u8]) -> Puzzle {
        let mut p = crate::puzzle::solved_puzzle();
        for &choice in choices {
            let neighbors: Vec<u8> = crate::puzzle::neighbors(p.zero_location()).collect();
            let dst = neighbors[choice as usize % neighbors.len()];
            p.apply_move(dst);
        }
        p
    }

    #[test]
    fn test_catalogue_hval_is_invariant_under_pdb_declaration_order() {
        let dir = tempfile::tempdir().unwrap();
        write_sample_pdbs(dir.path());

        let cat_text = dir.path().join("a_then_b.cat");
        std::fs::write(&cat_text, "1,2,3 pdb\n=0\n4,5,6 pdb\n=0\n").unwrap();
        let cat_a = Catalogue::load(&cat_text, dir.path(), CatalogueLoadConfig::default()).unwrap();

        let cat_text2 = dir.path().join("b_then_a.cat");
        std::fs::write(&cat_text2, "4,5,6 pdb\n=0\n1,2,3 pdb\n=0\n").unwrap();
        let cat_b = Catalogue::load(&cat_text2, dir.path(), CatalogueLoadConfig::default()).unwrap();

        for choices in [
            vec![],
            vec![0u8, 1, 2],
            vec![3, 2, 1, 0, 2, 3, 1],
            vec![1, 1, 2, 3, 0, 2, 1, 3, 2, 0],
        ] {
            let p = scramble(&choices);
            assert_eq!(cat_a.hval(&p), cat_b.hval(&p));
        }
    }

    #[test]
    fn test_diff_hvals_matches_fresh_partial_hvals_after_a_move() {
        let dir = tempfile::tempdir().unwrap();
        write_sample_pdbs(dir.path());

        let cat_text = dir.path().join("catalogue.cat");
        std::fs::write(&cat_text, "1,2,3 pdb\n=0\n4,5,6 pdb\n=0\n").unwrap();
        let cat = Catalogue::load(&cat_text, dir.path(), CatalogueLoadConfig::default()).unwrap();

        let scrambles: [&[u8]; 4] = [&[], &[0, 1, 2], &[2, 3, 1, 0], &[1, 2, 3, 0, 2, 1, 3]];
        for choices in scrambles {
            let old_p = scramble(choices);
            let mut ph = PartialHVals::new(cat.n_pdbs());
            cat.partial_hvals(&mut ph, &old_p);

            for dst in crate::puzzle::neighbors(old_p.zero_location()) {
                let moved_tile = old_p.grid[dst as usize];
                let mut new_p = old_p;
                new_p.apply_move(dst);

                let mut ph_diff = ph.clone();
                let diff_result = cat.diff_hvals(&mut ph_diff, &old_p, &new_p, moved_tile);

                let fresh_result = cat.hval(&new_p);
                assert_eq!(diff_result, fresh_result);
            }
        }
    }

    #[test]
    fn test_diff_hvals_uses_diff_lookup_for_identified_zero_tracked_pdb() {
        let dir = tempfile::tempdir().unwrap();
        write_sample_pdbs(dir.path());

        // A zero-tracked PDB, kept unidentified on disk (`.pdb`); the
        // catalogue is asked to identify it on load so `diff_hvals` can
        // exercise the `pdb::identify::diff_lookup` path for moves that
        // don't touch tiles 7 or 8.
        let ts_c = Tileset::from_tiles([0, 7, 8]);
        let aux = IndexAux::new(ts_c).unwrap();
        let (db, _) =
            crate::pdb::generator::generate(aux, crate::config::GenerationConfig::with_jobs(2)).unwrap();
        let path = dir.path().join(crate::pdb::filename::filename(ts_c, HeuristicKind::Raw));
        let mut file = File::create(path).unwrap();
        db.store(&mut file).unwrap();

        let cat_text = dir.path().join("catalogue.cat");
        std::fs::write(&cat_text, "1,2,3 pdb\n=0\n4,5,6 pdb\n=0\n0,7,8 pdb\n=1\n").unwrap();
        let cat = Catalogue::load(
            &cat_text,
            dir.path(),
            CatalogueLoadConfig {
                identify: true,
                verbose: false,
            },
        )
        .unwrap();

        let scrambles: [&[u8]; 3] = [&[], &[0, 1, 2], &[2, 3, 1, 0, 2, 1]];
        for choices in scrambles {
            let old_p = scramble(choices);
            let mut ph = PartialHVals::new(cat.n_pdbs());
            cat.partial_hvals(&mut ph, &old_p);

            for dst in crate::puzzle::neighbors(old_p.zero_location()) {
                let moved_tile = old_p.grid[dst as usize];
                if moved_tile == 7 || moved_tile == 8 {
                    // moved tile is itself in ts_c's pattern: that PDB
                    // takes the full-recompute branch, not diff_lookup.
                    continue;
                }
                let mut new_p = old_p;
                new_p.apply_move(dst);

                let mut ph_diff = ph.clone();
                let diff_result = cat.diff_hvals(&mut ph_diff, &old_p, &new_p, moved_tile);
                assert_eq!(diff_result, cat.hval(&new_p));
            }
        }
    }

    #[test]
    fn test_catalogue_hval_is_admissible_against_scramble_length() {
        let dir = tempfile::tempdir().unwrap();
        write_sample_pdbs(dir.path());

        let cat_text = dir.path().join("catalogue.cat");
        std::fs::write(&cat_text, "1,2,3 pdb\n=0\n4,5,6 pdb\n=0\n").unwrap();
        let cat = Catalogue::load(&cat_text, dir.path(), CatalogueLoadConfig::default()).unwrap();

        // h must never exceed the true optimal distance, which in turn
        // never exceeds the length of any path that reaches p (here, the
        // scramble itself) — so h <= scramble length is a valid, if
        // weaker, admissibility check that doesn't require solving the
        // full puzzle optimally.
        let scrambles: [&[u8]; 5] = [
            &[],
            &[0],
            &[0, 1, 2],
            &[2, 3, 1, 0, 2, 3],
            &[1, 2, 3, 0, 2, 1, 3, 2, 0, 1],
        ];
        for choices in scrambles {
            let p = scramble(choices);
            assert!(cat.hval(&p) as usize <= choices.len());
        }
    }
}
