// Library exports for tboxscan
pub mod alphabet;
pub mod fasta;
pub mod features;
pub mod hit;
pub mod infernal;
pub mod output;
pub mod pair_table;
pub mod position_map;
pub mod predict;
pub mod projector;
pub mod resolver;
pub mod thermo;
