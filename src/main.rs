use puzzledb::config::GenerationConfig;
use puzzledb::index::IndexAux;
use puzzledb::pdb::generator;
use puzzledb::puzzle::{neighbors, solved_puzzle, Puzzle};
use puzzledb::tileset::Tileset;
use puzzledb::Result;

fn scramble(moves: &[u8]) -> Puzzle {
    let mut p = solved_puzzle();
    for &dst in moves {
        if neighbors(p.zero_location()).any(|n| n == dst) {
            p.apply_move(dst);
        }
    }
    p
}

fn main() -> Result<()> {
    println!("puzzledb - additive pattern databases for the 24-puzzle\n");

    let ts = Tileset::from_tiles([0, 1, 2, 3, 4, 5]);
    println!("Building a PDB over tiles {:?} ...", ts.to_sorted_list());

    let aux = IndexAux::new(ts)?;
    let (db, stats) = generator::generate(aux, GenerationConfig::with_jobs(4).verbose(true))?;

    println!("\ndiameter: {}", stats.diameter);
    println!("depth histogram:");
    for (d, &count) in stats.histogram.iter().enumerate() {
        println!("  {d:3}: {count}");
    }

    let scrambled = scramble(&[1, 2, 7, 6, 5, 0, 1, 2, 3, 8]);
    println!("\nh(scrambled) = {}", db.lookup_puzzle(&scrambled));
    println!("h(solved)    = {}", db.lookup_puzzle(&solved_puzzle()));

    Ok(())
}
