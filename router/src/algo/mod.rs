pub mod astar;
pub mod cost;
pub mod heap;
pub mod mst;

pub use astar::{MazeRouter, PathStep, Seed};
pub use cost::{DirectedSearch, RoutingStrategy, SearchContext, TimingDriven};
