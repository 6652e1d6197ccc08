//! Blank equivalence classes and the process-wide index table cache
//!
//! When a tileset tracks the blank, two puzzle states with the same
//! `(maprank, pidx)` are equivalent if the blank can walk between their
//! blank positions without disturbing any pattern tile (spec.md §4.3).
//! `populate_eqclasses` finds these classes with a flood fill over the
//! complement of the pattern tiles' positions; [`IndexTable`] caches
//! one such table per `maprank` for a given tileset size, and
//! [`get_or_build`] is the process-wide, lazily-built, write-once cache
//! keyed by `k` that spec.md §3 calls out ("IndexTable cache").

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::puzzle::{neighbors, TILE_COUNT};
use crate::tileset::Tileset;

/// Sentinel for grid positions occupied by pattern tiles — these must
/// never be dereferenced as a real equivalence class id.
pub const UNREACHED_EQCLASS: u16 = u16::MAX;

/// Per-`maprank` equivalence class description.
#[derive(Debug, Clone)]
pub struct MapEntry {
    /// Number of connected components found.
    pub n_eqclass: u32,
    /// `eqclasses[p]` is the component id of grid position `p`, or
    /// [`UNREACHED_EQCLASS`] if `p` is occupied by a pattern tile.
    pub eqclasses: [u16; TILE_COUNT],
}

impl MapEntry {
    /// The lowest-numbered grid position belonging to equivalence
    /// class `eqidx` — the canonical blank position `invert_index`
    /// decodes to (spec.md §4.2's "canonical_zero_location").
    pub fn canonical_position(&self, eqidx: u32) -> u8 {
        (0..TILE_COUNT as u8)
            .find(|&p| self.eqclasses[p as usize] as u32 == eqidx)
            .expect("eqidx must be present in this maprank's eqclasses")
    }
}

/// Flood fill over the complement of `map` (grid positions not
/// occupied by pattern tiles), assigning each connected region a
/// distinct id starting at 0. Deterministic regardless of scan order.
pub fn populate_eqclasses(map: Tileset) -> ([u16; TILE_COUNT], u32) {
    let mut eqclasses = [UNREACHED_EQCLASS; TILE_COUNT];
    let mut next_id = 0u32;
    let mut stack = Vec::with_capacity(TILE_COUNT);

    for start in 0..TILE_COUNT as u8 {
        if map.contains(start) || eqclasses[start as usize] != UNREACHED_EQCLASS {
            continue;
        }

        eqclasses[start as usize] = next_id as u16;
        stack.push(start);

        while let Some(pos) = stack.pop() {
            for n in neighbors(pos) {
                if !map.contains(n) && eqclasses[n as usize] == UNREACHED_EQCLASS {
                    eqclasses[n as usize] = next_id as u16;
                    stack.push(n);
                }
            }
        }

        next_id += 1;
    }

    (eqclasses, next_id)
}

/// Table of [`MapEntry`] indexed by `maprank`, for tilesets with `k`
/// non-blank pattern tiles.
#[derive(Debug)]
pub struct IndexTable {
    pub entries: Vec<MapEntry>,
}

fn build_index_table(k: u32) -> IndexTable {
    let n = crate::tileset::binomial(TILE_COUNT as u32, k);
    let mut entries = Vec::with_capacity(n as usize);

    for r in 0..n {
        let map = Tileset::unrank(k, r);
        let (eqclasses, n_eqclass) = populate_eqclasses(map);
        entries.push(MapEntry { n_eqclass, eqclasses });
    }

    IndexTable { entries }
}

fn cache() -> &'static DashMap<u32, Arc<IndexTable>> {
    static CACHE: OnceLock<DashMap<u32, Arc<IndexTable>>> = OnceLock::new();
    CACHE.get_or_init(DashMap::new)
}

/// Returns the [`IndexTable`] for pattern-tile count `k`, building and
/// caching it on first use. Safe to call concurrently: `DashMap`'s
/// shard lock serializes concurrent builders for the same `k`.
pub fn get_or_build(k: u32) -> Arc<IndexTable> {
    Arc::clone(&cache().entry(k).or_insert_with(|| Arc::new(build_index_table(k))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_map_is_single_component() {
        let (eqclasses, n) = populate_eqclasses(Tileset::EMPTY);
        assert_eq!(n, 1);
        assert!(eqclasses.iter().all(|&c| c == 0));
    }

    #[test]
    fn test_full_map_has_no_components() {
        let (eqclasses, n) = populate_eqclasses(Tileset::least(25));
        assert_eq!(n, 0);
        assert!(eqclasses.iter().all(|&c| c == UNREACHED_EQCLASS));
    }

    #[test]
    fn test_pattern_tiles_marked_unreachable() {
        let map = Tileset::from_tiles([0, 1, 2]);
        let (eqclasses, _) = populate_eqclasses(map);
        assert_eq!(eqclasses[0], UNREACHED_EQCLASS);
        assert_eq!(eqclasses[1], UNREACHED_EQCLASS);
        assert_eq!(eqclasses[2], UNREACHED_EQCLASS);
        assert_ne!(eqclasses[3], UNREACHED_EQCLASS);
    }

    #[test]
    fn test_splitting_wall_creates_two_components() {
        // column 2 fully occupied by pattern tiles splits the 5x5 grid
        // into a left and a right half.
        let map = Tileset::from_tiles([2, 7, 12, 17, 22]);
        let (eqclasses, n) = populate_eqclasses(map);
        assert_eq!(n, 2);
        // position 0 (left half) and position 4 (right half) differ
        assert_ne!(eqclasses[0], eqclasses[4]);
        // positions within the same half agree
        assert_eq!(eqclasses[0], eqclasses[1]);
        assert_eq!(eqclasses[3], eqclasses[4]);
    }

    #[test]
    fn test_canonical_position_picks_minimum() {
        let map = Tileset::from_tiles([2, 7, 12, 17, 22]);
        let (eqclasses, _) = populate_eqclasses(map);
        let entry = MapEntry { n_eqclass: 2, eqclasses };
        let left_class = eqclasses[0];
        assert_eq!(entry.canonical_position(left_class as u32), 0);
    }

    #[test]
    fn test_get_or_build_is_cached_and_consistent() {
        let t1 = get_or_build(2);
        let t2 = get_or_build(2);
        assert!(Arc::ptr_eq(&t1, &t2));
        assert_eq!(t1.entries.len(), crate::tileset::binomial(25, 2) as usize);
    }

    #[test]
    fn test_deterministic_build_regardless_of_order() {
        let a = build_index_table(3);
        let b = build_index_table(3);
        for (ea, eb) in a.entries.iter().zip(b.entries.iter()) {
            assert_eq!(ea.n_eqclass, eb.n_eqclass);
            assert_eq!(ea.eqclasses, eb.eqclasses);
        }
    }
}
