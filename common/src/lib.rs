pub mod bit_grid;
pub mod grid;
pub mod interval;
pub mod parallel;

pub use bit_grid::BitGrid;
pub use grid::{Grid, MAX_DIMS};
pub use interval::Interval;
