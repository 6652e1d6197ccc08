//! Pattern database storage: allocation, I/O, and atomic entry access
//!
//! A [`PatternDb`] is one contiguous byte table addressed by [`Index`]:
//! tables are laid out maprank-ascending, each `n_perm * n_eqclass`
//! (or `n_perm` when the blank isn't tracked) bytes long, with no
//! padding between runs (spec.md §6). The same byte layout backs heap
//! allocation, a writable memory map used during generation, and a
//! read-only memory map used for lookups.

pub mod filename;
pub mod generator;
pub mod identify;

use std::fs::File;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU8, Ordering};

use memmap2::{Mmap, MmapMut};

use crate::error::{Error, Result};
use crate::index::{compute_index, Index, IndexAux};
use crate::puzzle::Puzzle;

/// Sentinel distance meaning "not yet reached by the generator".
pub const UNREACHED: u8 = u8::MAX;

/// Number of distinct byte values a PDB entry can hold, used to size
/// [`PatternDb::histogram`].
pub const HISTOGRAM_LEN: usize = 256;

enum Backing {
    Heap(Box<[u8]>),
    Mapped(MmapMut),
    ReadOnly(Mmap),
}

/// How to open a file-backed PDB with [`PatternDb::mmap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    /// `PDB_MAP_RDONLY`: the table is immutable after mapping.
    ReadOnly,
    /// `PDB_MAP_RDWR | PDB_MAP_SHARED`: writes are visible to other
    /// mappers of the same file and persist on `flush`.
    ReadWrite,
}

/// A dense, byte-per-entry pattern database for one tileset.
pub struct PatternDb {
    pub aux: IndexAux,
    backing: Backing,
    /// Byte offset of maprank `r`'s table within the flat backing
    /// buffer; `table_offsets[r + 1] - table_offsets[r]` (or the total
    /// length, for the last entry) is that table's size.
    table_offsets: Vec<u64>,
}

fn table_len(aux: &IndexAux, maprank: usize) -> u64 {
    let n_eqclass = match &aux.idxt {
        Some(idxt) => idxt.entries[maprank].n_eqclass as u64,
        None => 1,
    };
    aux.n_perm * n_eqclass
}

fn build_offsets(aux: &IndexAux) -> (Vec<u64>, u64) {
    let mut offsets = Vec::with_capacity(aux.n_maprank as usize);
    let mut total = 0u64;
    for r in 0..aux.n_maprank as usize {
        offsets.push(total);
        total += table_len(aux, r);
    }
    (offsets, total)
}

impl PatternDb {
    /// Allocates a heap-backed PDB, all entries set to [`UNREACHED`].
    pub fn allocate(aux: IndexAux) -> Self {
        let (table_offsets, total) = build_offsets(&aux);
        let bytes = vec![UNREACHED; total as usize].into_boxed_slice();
        PatternDb {
            aux,
            backing: Backing::Heap(bytes),
            table_offsets,
        }
    }

    /// Resets every entry to [`UNREACHED`]. Panics on a read-only
    /// mapped PDB: clearing one makes no sense for a finished table.
    pub fn clear(&mut self) {
        match &mut self.backing {
            Backing::Heap(b) => b.fill(UNREACHED),
            Backing::Mapped(m) => m.fill(UNREACHED),
            Backing::ReadOnly(_) => panic!("cannot clear a read-only mapped PDB"),
        }
    }

    /// Reads a PDB previously written by [`Self::store`] into a fresh
    /// heap allocation. Fails if the stream length doesn't match what
    /// `aux` predicts (spec.md §6: "file length equals ...").
    pub fn load<R: Read>(aux: IndexAux, reader: &mut R) -> Result<Self> {
        let (table_offsets, total) = build_offsets(&aux);
        let mut bytes = vec![0u8; total as usize];
        reader.read_exact(&mut bytes).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::Format(format!(
                    "PDB file too short: expected {total} bytes for this tileset"
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let mut trailing = [0u8; 1];
        if reader.read(&mut trailing)? != 0 {
            return Err(Error::Format(format!(
                "PDB file longer than the {total} bytes expected for this tileset"
            )));
        }

        Ok(PatternDb {
            aux,
            backing: Backing::Heap(bytes.into_boxed_slice()),
            table_offsets,
        })
    }

    /// Writes the table in maprank-ascending order, no header, no
    /// padding — the exact layout [`Self::load`]/[`Self::mmap`] expect.
    pub fn store<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(self.bytes())?;
        Ok(())
    }

    /// Memory-maps `file` as the backing store for a PDB over `aux`.
    /// The file's length must already match what `aux` predicts; use
    /// [`Self::allocate`] + [`Self::store`] (or a pre-sized `ftruncate`)
    /// to create one first.
    pub fn mmap(aux: IndexAux, file: &File, mode: MapMode) -> Result<Self> {
        let (table_offsets, total) = build_offsets(&aux);
        let metadata = file.metadata()?;
        if metadata.len() != total {
            return Err(Error::Format(format!(
                "PDB file is {} bytes, expected {total} for this tileset",
                metadata.len()
            )));
        }

        let backing = match mode {
            MapMode::ReadOnly => {
                let mmap = unsafe { Mmap::map(file)? };
                #[cfg(unix)]
                unsafe {
                    libc::madvise(
                        mmap.as_ptr() as *mut libc::c_void,
                        mmap.len(),
                        libc::MADV_RANDOM,
                    );
                }
                Backing::ReadOnly(mmap)
            }
            MapMode::ReadWrite => {
                let mmap = unsafe { MmapMut::map_mut(file)? };
                #[cfg(unix)]
                unsafe {
                    libc::madvise(
                        mmap.as_ptr() as *mut libc::c_void,
                        mmap.len(),
                        libc::MADV_WILLNEED,
                    );
                }
                Backing::Mapped(mmap)
            }
        };

        Ok(PatternDb {
            aux,
            backing,
            table_offsets,
        })
    }

    /// Flushes a writable memory-mapped PDB's pages back to disk.
    /// No-op for heap-backed or read-only PDBs.
    pub fn flush(&self) -> Result<()> {
        if let Backing::Mapped(m) = &self.backing {
            m.flush()?;
        }
        Ok(())
    }

    fn bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Heap(b) => b,
            Backing::Mapped(m) => m,
            Backing::ReadOnly(m) => m,
        }
    }

    fn entry_offset(&self, idx: &Index) -> u64 {
        let base = self.table_offsets[idx.maprank as usize];
        match idx.eqidx {
            Some(eqidx) => base + eqidx as u64 * self.aux.n_perm + idx.pidx,
            None => base + idx.pidx,
        }
    }

    /// Reinterprets the byte at `offset` as an atomic cell. Sound
    /// because `AtomicU8` and `u8` share layout; callers only ever
    /// touch PDB bytes through atomic operations during generation, so
    /// there is no mixed atomic/non-atomic access to the same byte.
    fn atomic_entry(&self, offset: u64) -> &AtomicU8 {
        let bytes = self.bytes();
        debug_assert!((offset as usize) < bytes.len());
        unsafe { &*(bytes.as_ptr().add(offset as usize) as *const AtomicU8) }
    }

    /// Returns the raw distance byte for `idx` (0..254, or
    /// [`UNREACHED`]).
    ///
    /// Plain (non-atomic) read: callers must ensure nothing is
    /// concurrently writing this exact cell. [`Self::lookup_relaxed`]
    /// is the atomic counterpart used by the generator, which does
    /// race with writers to other cells in the same table by design.
    pub fn lookup(&self, idx: &Index) -> u8 {
        self.bytes()[self.entry_offset(idx) as usize]
    }

    /// Atomic counterpart of [`Self::lookup`] (relaxed ordering).
    /// The BFS generator scans cells across maprank-parallel tasks
    /// while other tasks concurrently conditionally-update cells that
    /// can land in any maprank's table (a pattern tile's move changes
    /// maprank), so the scan itself must use an atomic load.
    pub fn lookup_relaxed(&self, idx: &Index) -> u8 {
        self.atomic_entry(self.entry_offset(idx)).load(Ordering::Relaxed)
    }

    /// Convenience wrapper combining [`compute_index`] and
    /// [`Self::lookup`].
    pub fn lookup_puzzle(&self, p: &Puzzle) -> u8 {
        self.lookup(&compute_index(&self.aux, p))
    }

    /// Unconditionally stores `dist` at `idx` with relaxed ordering.
    pub fn update(&self, idx: &Index, dist: u8) {
        self.atomic_entry(self.entry_offset(idx))
            .store(dist, Ordering::Relaxed);
    }

    /// Stores `dist` at `idx` iff the cell currently holds
    /// [`UNREACHED`]. Returns whether the store happened. This is the
    /// single BFS-safe primitive: two racing writers proposing the
    /// same `dist` both succeed or both fail harmlessly (spec.md §4.4).
    pub fn conditional_update(&self, idx: &Index, dist: u8) -> bool {
        self.atomic_entry(self.entry_offset(idx))
            .compare_exchange(UNREACHED, dist, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

    /// Number of entries, across every maprank table.
    pub fn len(&self) -> u64 {
        self.bytes().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries reachable with a given exact distance,
    /// indexed `0..256` (index 255 counts [`UNREACHED`] cells).
    pub fn histogram(&self) -> [u64; HISTOGRAM_LEN] {
        let mut hist = [0u64; HISTOGRAM_LEN];
        for &b in self.bytes() {
            hist[b as usize] += 1;
        }
        hist
    }

    /// A memory mapping hint usable before generation: large
    /// sequential writes benefit from a different access pattern than
    /// random point lookups. Returns the region's size for convenience.
    pub fn allocate_mmap(aux: IndexAux, path: &std::path::Path) -> Result<Self> {
        let (_, total) = build_offsets(&aux);
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(total)?;
        Self::mmap(aux, &file, MapMode::ReadWrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tileset::Tileset;
    use std::io::Cursor;

    fn small_aux() -> IndexAux {
        IndexAux::new(Tileset::from_tiles([0, 1, 2])).unwrap()
    }

    #[test]
    fn test_allocate_is_all_unreached() {
        let db = PatternDb::allocate(small_aux());
        assert!(db.bytes().iter().all(|&b| b == UNREACHED));
    }

    #[test]
    fn test_update_and_lookup() {
        let aux = small_aux();
        let idx = Index {
            maprank: 0,
            pidx: 0,
            eqidx: Some(0),
        };
        let db = PatternDb::allocate(aux);
        db.update(&idx, 5);
        assert_eq!(db.lookup(&idx), 5);
    }

    #[test]
    fn test_conditional_update_only_succeeds_once() {
        let aux = small_aux();
        let idx = Index {
            maprank: 0,
            pidx: 0,
            eqidx: Some(0),
        };
        let db = PatternDb::allocate(aux);
        assert!(db.conditional_update(&idx, 1));
        assert!(!db.conditional_update(&idx, 2));
        assert_eq!(db.lookup(&idx), 1);
    }

    #[test]
    fn test_store_load_round_trip() {
        let aux = small_aux();
        let db = PatternDb::allocate(aux);
        db.update(
            &Index {
                maprank: 1,
                pidx: 0,
                eqidx: Some(0),
            },
            7,
        );

        let mut buf = Vec::new();
        db.store(&mut buf).unwrap();

        let aux2 = small_aux();
        let loaded = PatternDb::load(aux2, &mut Cursor::new(buf)).unwrap();
        assert_eq!(
            loaded.lookup(&Index {
                maprank: 1,
                pidx: 0,
                eqidx: Some(0)
            }),
            7
        );
    }

    #[test]
    fn test_load_rejects_short_file() {
        let aux = small_aux();
        let mut buf = Cursor::new(vec![0u8; 3]);
        assert!(PatternDb::load(aux, &mut buf).is_err());
    }

    #[test]
    fn test_histogram_counts_entries() {
        let aux = small_aux();
        let total = build_offsets(&aux).1;
        let db = PatternDb::allocate(aux);
        let hist = db.histogram();
        assert_eq!(hist[UNREACHED as usize], total);
    }

    #[test]
    fn test_lookup_puzzle_matches_solved_entry() {
        let aux = small_aux();
        let db = PatternDb::allocate(aux);
        let idx = compute_index(&db.aux, &crate::puzzle::solved_puzzle());
        db.update(&idx, 0);
        assert_eq!(db.lookup_puzzle(&crate::puzzle::solved_puzzle()), 0);
    }
}
