//! Board symmetries and canonical tileset selection
//!
//! The 5x5 sliding-puzzle move graph is preserved by the 8-element
//! symmetry group of the square (the dihedral group D4: 4 rotations, 4
//! reflections). spec.md §4.7 uses this to store a PDB once per
//! symmetry class of tileset rather than once per tileset.

use super::Tileset;

/// One of the 8 grid symmetries that preserve orthogonal adjacency on
/// a square board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symmetry {
    Identity,
    Rotate90,
    Rotate180,
    Rotate270,
    FlipHorizontal,
    FlipVertical,
    FlipMainDiagonal,
    FlipAntiDiagonal,
}

/// All 8 symmetries, in a fixed, deterministic order. The order only
/// matters for breaking ties in [`canonical_automorphism`]: the first
/// symmetry achieving the lexicographically smallest image wins.
pub const ALL_SYMMETRIES: [Symmetry; 8] = [
    Symmetry::Identity,
    Symmetry::Rotate90,
    Symmetry::Rotate180,
    Symmetry::Rotate270,
    Symmetry::FlipHorizontal,
    Symmetry::FlipVertical,
    Symmetry::FlipMainDiagonal,
    Symmetry::FlipAntiDiagonal,
];

const SIDE: i32 = crate::puzzle::GRID_SIDE as i32;

/// Applies `sym` to a single grid position.
pub fn transform_pos(sym: Symmetry, pos: u8) -> u8 {
    let row = pos as i32 / SIDE;
    let col = pos as i32 % SIDE;
    let last = SIDE - 1;

    let (r, c) = match sym {
        Symmetry::Identity => (row, col),
        Symmetry::Rotate90 => (col, last - row),
        Symmetry::Rotate180 => (last - row, last - col),
        Symmetry::Rotate270 => (last - col, row),
        Symmetry::FlipHorizontal => (row, last - col),
        Symmetry::FlipVertical => (last - row, col),
        Symmetry::FlipMainDiagonal => (col, row),
        Symmetry::FlipAntiDiagonal => (last - col, last - row),
    };

    (r * SIDE + c) as u8
}

/// Applies `sym` to every position in `ts`, returning the image
/// tileset.
pub fn morph(ts: Tileset, sym: Symmetry) -> Tileset {
    let mut out = Tileset::EMPTY;
    for t in ts.iter() {
        out = out.add(transform_pos(sym, t));
    }
    out
}

/// Returns the symmetry that maps `ts` to its lexicographically
/// smallest image (smallest as a 32-bit bitmask value). PDBs are
/// stored under this canonical tileset only; callers morph puzzle
/// coordinates with the returned symmetry before lookup.
pub fn canonical_automorphism(ts: Tileset) -> Symmetry {
    ALL_SYMMETRIES
        .into_iter()
        .min_by_key(|&sym| morph(ts, sym).0)
        .expect("ALL_SYMMETRIES is non-empty")
}
