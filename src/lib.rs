//! puzzledb - additive disjoint pattern databases for the 24-puzzle
//!
//! puzzledb builds and queries pattern database (PDB) admissible
//! heuristics for the 5x5 sliding-tile puzzle. A PDB maps every
//! reachable arrangement of a chosen subset of tiles ("pattern tiles")
//! to the minimum number of moves required to solve that subset in
//! isolation; summing several disjoint PDBs' values at runtime gives a
//! heuristic that is still admissible as long as each move is only
//! charged to one PDB in the sum.
//!
//! # Examples
//!
//! ## Building and querying a small PDB
//!
//! ```no_run
//! use puzzledb::config::GenerationConfig;
//! use puzzledb::index::IndexAux;
//! use puzzledb::pdb::generator;
//! use puzzledb::tileset::Tileset;
//!
//! let ts = Tileset::from_tiles([0, 1, 2, 3, 4]);
//! let aux = IndexAux::new(ts)?;
//! let (table, stats) = generator::generate(aux, GenerationConfig::default())?;
//! println!("diameter: {}", stats.diameter);
//! # Ok::<(), puzzledb::Error>(())
//! ```
//!
//! ## Combining PDBs through a catalogue
//!
//! ```no_run
//! use puzzledb::catalogue::Catalogue;
//! use puzzledb::config::CatalogueLoadConfig;
//!
//! let cat = Catalogue::load("puzzle.cat", "heudir", CatalogueLoadConfig::default())?;
//! let h = cat.hval(&puzzledb::puzzle::solved_puzzle());
//! # Ok::<(), puzzledb::Error>(())
//! ```

pub mod catalogue;
pub mod config;
pub mod error;
pub mod index;
pub mod pdb;
pub mod puzzle;
pub mod tileset;

pub use error::{Error, Result};
pub use index::{compute_index, invert_index, Index, IndexAux};
pub use puzzle::Puzzle;
pub use tileset::Tileset;
