//! Parallel level-synchronous BFS pattern database construction
//!
//! Fills every PDB cell with the exact number of moves from the solved
//! configuration to a representative of that cell's equivalence class
//! (spec.md §4.4). One `rayon` parallel pass over the `maprank` axis
//! per BFS depth gives the barrier the algorithm needs between depths
//! "for free": `par_iter().sum()` does not return until every maprank
//! slice for this depth has finished, so nothing proceeds to depth
//! `d+1` before every store at depth `d` has landed.

use rayon::prelude::*;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::index::{compute_index, invert_index, relabel_zero_to};
use crate::pdb::{PatternDb, UNREACHED};
use crate::puzzle::{neighbors, solved_puzzle, Puzzle, ZERO_TILE};
use crate::tileset::Tileset;
use crate::Index;

/// Per-depth and summary statistics returned by [`generate`].
#[derive(Debug, Clone)]
pub struct GenerationStats {
    /// Number of cells discovered at each distance, `histogram[d]` for
    /// `d` in `0..=diameter`.
    pub histogram: Vec<u64>,
    /// The largest distance assigned to any cell — the diameter of
    /// the abstraction's state graph.
    pub diameter: u8,
}

/// Allocates a fresh PDB for `aux` and fills it with [`generate_into`].
pub fn generate(aux: crate::index::IndexAux, config: GenerationConfig) -> Result<(PatternDb, GenerationStats)> {
    let mut db = PatternDb::allocate(aux);
    let stats = generate_into(&mut db, config)?;
    Ok((db, stats))
}

/// Fills `db` (any backing: heap, or a writable memory map) via
/// parallel level-synchronous BFS, per spec.md §4.4. `db` is cleared
/// first, so this is safe to call repeatedly / re-run.
pub fn generate_into(db: &mut PatternDb, config: GenerationConfig) -> Result<GenerationStats> {
    db.clear();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .build()
        .map_err(|e| Error::Invariant(format!("failed to build worker pool: {e}")))?;

    let solved_idx = compute_index(&db.aux, &solved_puzzle());
    db.update(&solved_idx, 0);

    let mut histogram = vec![1u64];
    let mut depth: u8 = 0;

    loop {
        if depth == UNREACHED - 1 {
            return Err(Error::Invariant(
                "BFS reached the maximum representable distance (254); abstraction too large"
                    .into(),
            ));
        }

        let db_ref = &*db;
        let n_maprank = db_ref.aux.n_maprank;
        let discovered: u64 = pool.install(|| {
            (0..n_maprank)
                .into_par_iter()
                .map(|maprank| expand_maprank(db_ref, maprank as usize, depth))
                .sum()
        });

        if config.verbose {
            eprintln!("depth {depth}: {discovered} new cells");
        }

        if discovered == 0 {
            break;
        }

        depth += 1;
        histogram.push(discovered);
    }

    Ok(GenerationStats {
        histogram,
        diameter: depth,
    })
}

/// Swaps the tiles occupying grid positions `a` and `b`.
fn swap_positions(p: &mut Puzzle, a: u8, b: u8) {
    let ta = p.grid[a as usize];
    let tb = p.grid[b as usize];
    p.tiles[ta as usize] = b;
    p.tiles[tb as usize] = a;
    p.grid[a as usize] = tb;
    p.grid[b as usize] = ta;
}

/// Scans every cell of one maprank's table currently holding `depth`
/// and conditionally updates its pattern-tile-move neighbours to
/// `depth + 1`. Returns the number of successful updates.
fn expand_maprank(db: &PatternDb, maprank: usize, depth: u8) -> u64 {
    let aux = &db.aux;
    let zero_tracked = aux.ts.contains(ZERO_TILE);
    let map = Tileset::unrank(aux.n_tile, maprank as u64);
    let mut discovered = 0u64;

    let eqclass_entry = if zero_tracked {
        Some(&aux.idxt.as_ref().expect("zero-tracked aux must carry idxt").entries[maprank])
    } else {
        None
    };
    let n_eqclass = eqclass_entry.map(|e| e.n_eqclass).unwrap_or(1);

    for eqidx in 0..n_eqclass {
        for pidx in 0..aux.n_perm {
            let idx = Index {
                maprank: maprank as u64,
                pidx,
                eqidx: zero_tracked.then_some(eqidx),
            };
            if db.lookup_relaxed(&idx) != depth {
                continue;
            }

            let p = invert_index(aux, &idx);

            for q in map.iter() {
                for r in neighbors(q) {
                    if let Some(entry) = eqclass_entry {
                        if entry.eqclasses[r as usize] as u32 != eqidx {
                            continue;
                        }
                    } else if map.contains(r) {
                        continue;
                    }

                    let mut p2 = p;
                    if zero_tracked {
                        relabel_zero_to(&mut p2, r);
                    }
                    swap_positions(&mut p2, q, r);

                    let new_idx = compute_index(aux, &p2);
                    if db.conditional_update(&new_idx, depth + 1) {
                        discovered += 1;
                    }
                }
            }
        }
    }

    discovered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexAux;

    #[test]
    fn test_solved_index_is_zero() {
        let aux = IndexAux::new(Tileset::from_tiles([0, 1, 2])).unwrap();
        let (db, stats) = generate(aux, GenerationConfig::with_jobs(1)).unwrap();
        let idx = compute_index(&db.aux, &solved_puzzle());
        assert_eq!(db.lookup(&idx), 0);
        assert!(stats.diameter > 0);
    }

    #[test]
    fn test_every_cell_eventually_reached_for_small_tileset() {
        // A tileset of size 2 with the blank tracked is small enough
        // that its whole abstract graph should be reachable.
        let aux = IndexAux::new(Tileset::from_tiles([0, 1, 2])).unwrap();
        let (db, _) = generate(aux, GenerationConfig::with_jobs(1)).unwrap();
        assert!(db.histogram()[UNREACHED as usize] == 0);
    }

    #[test]
    fn test_generation_deterministic_regardless_of_job_count() {
        let aux1 = IndexAux::new(Tileset::from_tiles([0, 1, 2])).unwrap();
        let aux2 = IndexAux::new(Tileset::from_tiles([0, 1, 2])).unwrap();
        let (db1, stats1) = generate(aux1, GenerationConfig::with_jobs(1)).unwrap();
        let (db2, stats2) = generate(aux2, GenerationConfig::with_jobs(4)).unwrap();

        assert_eq!(stats1.diameter, stats2.diameter);
        for maprank in 0..db1.aux.n_maprank {
            for pidx in 0..db1.aux.n_perm {
                for eqidx in 0..db1.aux.idxt.as_ref().unwrap().entries[maprank as usize].n_eqclass {
                    let idx = Index {
                        maprank,
                        pidx,
                        eqidx: Some(eqidx),
                    };
                    assert_eq!(db1.lookup(&idx), db2.lookup(&idx));
                }
            }
        }
    }

    #[test]
    fn test_untracked_blank_generation_matches_tracked_minimum() {
        // Without the blank tracked, the PDB still assigns 0 to the
        // solved pattern-tile arrangement and fills every maprank.
        let aux = IndexAux::new(Tileset::from_tiles([1, 2, 3])).unwrap();
        let (db, _) = generate(aux, GenerationConfig::with_jobs(2)).unwrap();
        let idx = compute_index(&db.aux, &solved_puzzle());
        assert_eq!(idx.eqidx, None);
        assert_eq!(db.lookup(&idx), 0);
    }
}
