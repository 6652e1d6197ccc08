//! Perfect hashing of puzzle configurations into dense PDB addresses
//!
//! spec.md §4.2: an [`Index`] addresses the entries of a pattern
//! database table as `(maprank, pidx, eqidx)` — the rank of the
//! pattern tiles' position set, the rank of their permutation within
//! that set, and (only when the blank is tracked) the blank's
//! equivalence class among positions reachable without disturbing the
//! pattern tiles. [`IndexAux`] precomputes everything about a tileset
//! that doesn't depend on a specific puzzle configuration.

pub mod eqclass;

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::puzzle::{Puzzle, TILE_COUNT, ZERO_TILE};
use crate::tileset::{binomial, factorial, permutation_parity, Tileset, INDEX_MAX_TILES};

pub use eqclass::IndexTable;

/// Precomputed, puzzle-independent facts about one tileset, shared by
/// every [`compute_index`]/[`invert_index`] call against it.
#[derive(Debug, Clone)]
pub struct IndexAux {
    /// The tileset as given, possibly including [`ZERO_TILE`].
    pub ts: Tileset,
    /// `ts` with the blank tile removed — the tiles actually ranked by
    /// `maprank`/`pidx`.
    pub tsnz: Tileset,
    /// `tsnz.count()`.
    pub n_tile: u32,
    /// Number of distinct `maprank` values, `C(25, n_tile)`.
    pub n_maprank: u64,
    /// Number of distinct `pidx` values, `n_tile!`.
    pub n_perm: u64,
    /// Parity of the pattern tiles' permutation in the solved puzzle,
    /// kept for fidelity with the original data model.
    pub solved_parity: bool,
    /// Blank equivalence-class table, present iff `ts` tracks the blank.
    pub idxt: Option<Arc<IndexTable>>,
}

impl IndexAux {
    /// Builds the auxiliary data for `ts`. Fails if `ts` has more than
    /// [`INDEX_MAX_TILES`] non-blank tiles.
    pub fn new(ts: Tileset) -> Result<Self> {
        let tsnz = ts.remove(ZERO_TILE);
        let n_tile = tsnz.count();
        if n_tile > INDEX_MAX_TILES {
            return Err(Error::Size(format!(
                "tileset has {n_tile} non-blank tiles, maximum supported is {INDEX_MAX_TILES}"
            )));
        }

        let n_maprank = binomial(TILE_COUNT as u32, n_tile);
        let n_perm = factorial(n_tile);
        let solved_parity = permutation_parity(tsnz, &crate::puzzle::solved_puzzle());
        let idxt = if ts.contains(ZERO_TILE) {
            Some(eqclass::get_or_build(n_tile))
        } else {
            None
        };

        Ok(Self {
            ts,
            tsnz,
            n_tile,
            n_maprank,
            n_perm,
            solved_parity,
            idxt,
        })
    }

    fn index_table(&self) -> &IndexTable {
        self.idxt
            .as_deref()
            .expect("index_table called on an aux that does not track the blank")
    }
}

/// The dense address of one puzzle configuration within a PDB table
/// built over `IndexAux::ts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Index {
    /// Rank of the pattern tiles' position set among all `C(25,
    /// n_tile)` subsets.
    pub maprank: u64,
    /// Rank of the pattern tiles' permutation within their position
    /// set, `0..n_perm`.
    pub pidx: u64,
    /// Blank equivalence class, `Some` iff the tileset tracks the
    /// blank. Modeled as `Option` rather than a sentinel so untracked
    /// and tracked-but-zero are never confusable.
    pub eqidx: Option<u32>,
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.eqidx {
            Some(e) => write!(f, "{}:{}:{}", self.maprank, self.pidx, e),
            None => write!(f, "{}:{}", self.maprank, self.pidx),
        }
    }
}

/// Bitset of grid positions occupied by `aux.tsnz`'s tiles in `p`.
///
/// Dispatches to a vectorized x86_64 kernel when available, otherwise
/// the scalar fallback. Both are public so tests can check they agree.
pub fn tile_map(aux: &IndexAux, p: &Puzzle) -> Tileset {
    #[cfg(target_arch = "x86_64")]
    {
        unsafe { tile_map_simd(aux, p) }
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        tile_map_scalar(aux, p)
    }
}

/// Scalar reference implementation of [`tile_map`].
pub fn tile_map_scalar(aux: &IndexAux, p: &Puzzle) -> Tileset {
    let mut map = Tileset::EMPTY;
    for t in aux.tsnz.iter() {
        map = map.add(p.tiles[t as usize]);
    }
    map
}

/// SSE2 kernel for [`tile_map`]. SSE2 is part of the x86_64 baseline
/// ABI, so no runtime feature probing is needed. For each pattern tile
/// we broadcast-compare its id against all 25 grid cells at once and
/// OR the resulting position mask in; this is simpler than packing a
/// complement byte vector and matching it in one shot (the approach
/// the original SSE4.2 `pcmpistrm` kernel uses) at the cost of one
/// compare per pattern tile rather than one compare total.
#[cfg(target_arch = "x86_64")]
unsafe fn tile_map_simd(aux: &IndexAux, p: &Puzzle) -> Tileset {
    use std::arch::x86_64::*;

    let grid_lo = _mm_loadu_si128(p.grid.as_ptr() as *const __m128i);
    let mut hi_buf = [0u8; 16];
    hi_buf[..9].copy_from_slice(&p.grid[16..25]);
    let grid_hi = _mm_loadu_si128(hi_buf.as_ptr() as *const __m128i);

    let mut mask: u32 = 0;
    for t in aux.tsnz.iter() {
        let needle = _mm_set1_epi8(t as i8);
        let eq_lo = _mm_cmpeq_epi8(needle, grid_lo);
        let eq_hi = _mm_cmpeq_epi8(needle, grid_hi);
        let m_lo = _mm_movemask_epi8(eq_lo) as u32;
        let m_hi = _mm_movemask_epi8(eq_hi) as u32;
        mask |= m_lo | (m_hi << 16);
    }

    Tileset(mask & Tileset::least(TILE_COUNT as u32).0)
}

/// Lehmer-code rank of the pattern tiles' permutation within `map`,
/// processed in ascending tile-id order: the first (smallest-id) tile
/// contributes the least-significant digit, each subsequent tile a
/// digit in an increasing falling-factorial radix. See spec.md §4.2.
fn index_permutation(tsnz: Tileset, map: Tileset, p: &Puzzle) -> u64 {
    let mut ts = tsnz;
    let mut map = map;
    if ts.is_empty() {
        return 0;
    }

    let mut n_tiles = ts.count() as u64;
    let least_idx = ts.get_least().unwrap();
    let least_pos = p.tiles[least_idx as usize];
    let mut pidx = map.rank_within(least_pos) as u64;
    map = map.remove(least_pos);
    ts = ts.remove_least();

    let mut factor = 1u64;
    while let Some(least_idx) = ts.get_least() {
        let least_pos = p.tiles[least_idx as usize];
        factor *= n_tiles;
        n_tiles -= 1;
        pidx += factor * map.rank_within(least_pos) as u64;
        map = map.remove(least_pos);
        ts = ts.remove_least();
    }

    pidx
}

/// Inverse of [`index_permutation`], also filling in non-pattern tile
/// ids with a canonical arrangement (ascending id into the remaining
/// positions) as spec.md §4.2 directs.
fn invert_permutation(tsnz: Tileset, map: Tileset, pidx: u64) -> Puzzle {
    let mut n_tiles = tsnz.count() as u64;
    let mut pidx = pidx;
    let mut map = map;
    let mut cmap = map.complement();

    let mut tiles = [0u8; TILE_COUNT];
    let mut grid = [0u8; TILE_COUNT];

    for i in 0..TILE_COUNT as u8 {
        let pos = if tsnz.contains(i) {
            let cmp = (pidx % n_tiles) as u32;
            pidx /= n_tiles;
            n_tiles -= 1;
            let pos = map.select_nth(cmp);
            map = map.remove(pos);
            pos
        } else {
            let pos = cmap.get_least().expect("cmap exhausted before non-pattern tiles");
            cmap = cmap.remove_least();
            pos
        };
        tiles[i as usize] = pos;
        grid[pos as usize] = i;
    }

    Puzzle { tiles, grid }
}

/// Relabels the blank (tile 0) to occupy `target`, swapping identities
/// with whatever non-pattern tile currently sits there. This is a pure
/// bookkeeping relabeling of two interchangeable "don't care" tiles,
/// not a physical slide — both `target` and the blank's current
/// position are guaranteed non-pattern positions.
pub(crate) fn relabel_zero_to(p: &mut Puzzle, target: u8) {
    let current = p.zero_location();
    if current == target {
        return;
    }
    let other = p.grid[target as usize];
    p.tiles[ZERO_TILE as usize] = target;
    p.tiles[other as usize] = current;
    p.grid[target as usize] = ZERO_TILE;
    p.grid[current as usize] = other;
}

/// Computes the dense [`Index`] of puzzle `p` under tileset `aux`.
pub fn compute_index(aux: &IndexAux, p: &Puzzle) -> Index {
    let map = tile_map(aux, p);
    let maprank = map.rank();
    let pidx = index_permutation(aux.tsnz, map, p);

    let eqidx = if aux.ts.contains(ZERO_TILE) {
        let entry = &aux.index_table().entries[maprank as usize];
        Some(entry.eqclasses[p.zero_location() as usize] as u32)
    } else {
        None
    };

    Index { maprank, pidx, eqidx }
}

/// Reconstructs a representative puzzle configuration for `idx` under
/// tileset `aux`. Non-pattern tiles (and the blank, if untracked) are
/// filled in a canonical arrangement; this is the inverse of
/// [`compute_index`] up to that canonicalization.
pub fn invert_index(aux: &IndexAux, idx: &Index) -> Puzzle {
    let map = Tileset::unrank(aux.n_tile, idx.maprank);
    let mut p = invert_permutation(aux.tsnz, map, idx.pidx);

    if aux.ts.contains(ZERO_TILE) {
        let entry = &aux.index_table().entries[idx.maprank as usize];
        let eqidx = idx.eqidx.expect("zero-tracked index must carry eqidx");
        let target = entry.canonical_position(eqidx);
        relabel_zero_to(&mut p, target);
    }

    p
}
