//! PDB identification: diff-encoding against the per-`(maprank,pidx)`
//! minimum, enabling cheap incremental lookups after a blank-only move
//!
//! spec.md §4.5. After generation, `identify` rewrites every
//! zero-tracked cell `c` at `(maprank, pidx, eqidx)` to `c -
//! min_eqidx' table[maprank, pidx, eqidx']`, keeping the subtracted
//! minimum in a side table indexed by `(maprank, pidx)`. Given an
//! up-to-date `old_h` and a move that only changes the blank's
//! equivalence class, [`diff_lookup`] recovers the new `h` from one
//! extra table read instead of a full recomputation.

use crate::error::{Error, Result};
use crate::index::Index;
use crate::pdb::{PatternDb, UNREACHED};
use crate::puzzle::ZERO_TILE;

/// Per-`(maprank, pidx)` minimum subtracted out by [`identify`].
/// `mins[maprank * n_perm + pidx]` (n_perm is constant across maprank,
/// unlike `n_eqclass`, so this flat layout needs no offset table).
#[derive(Debug, Clone)]
pub struct Mins {
    values: Vec<u8>,
    n_perm: u64,
}

impl Mins {
    pub fn get(&self, maprank: u64, pidx: u64) -> u8 {
        self.values[(maprank * self.n_perm + pidx) as usize]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.values
    }
}

/// Rewrites `db` in place into diff-encoded ("identified") form and
/// returns the subtracted minima. Requires a zero-tracked tileset:
/// diff-encoding only pays off when the blank's position varies
/// independently of the pattern tiles.
pub fn identify(db: &mut PatternDb) -> Result<Mins> {
    if !db.aux.ts.contains(ZERO_TILE) {
        return Err(Error::Invariant(
            "PDB identification requires a zero-tracked tileset".into(),
        ));
    }

    let aux = db.aux.clone();
    let idxt = aux.idxt.as_ref().expect("zero-tracked aux must carry idxt");
    let mut mins = vec![UNREACHED; (aux.n_maprank * aux.n_perm) as usize];

    for maprank in 0..aux.n_maprank {
        let entry = &idxt.entries[maprank as usize];
        for pidx in 0..aux.n_perm {
            let mut m = UNREACHED;
            for eqidx in 0..entry.n_eqclass {
                let idx = Index {
                    maprank,
                    pidx,
                    eqidx: Some(eqidx),
                };
                m = m.min(db.lookup(&idx));
            }
            mins[(maprank * aux.n_perm + pidx) as usize] = m;

            for eqidx in 0..entry.n_eqclass {
                let idx = Index {
                    maprank,
                    pidx,
                    eqidx: Some(eqidx),
                };
                let c = db.lookup(&idx);
                if c != UNREACHED {
                    db.update(&idx, c - m);
                }
            }
        }
    }

    Ok(Mins {
        values: mins,
        n_perm: aux.n_perm,
    })
}

/// Recomputes `h` after a move that changes only the blank's
/// equivalence class for this PDB (`old_idx` and `new_idx` must share
/// `maprank`/`pidx`), given the identified `db` and the caller's
/// previously known `old_h`.
pub fn diff_lookup(db: &PatternDb, old_idx: &Index, new_idx: &Index, old_h: u8) -> u8 {
    debug_assert_eq!(old_idx.maprank, new_idx.maprank);
    debug_assert_eq!(old_idx.pidx, new_idx.pidx);

    let old_diff = db.lookup(old_idx);
    let new_diff = db.lookup(new_idx);
    old_h - old_diff + new_diff
}
