pub mod arch;
pub mod core;
pub mod grid;
pub mod indices;
pub mod netlist;
pub mod record;
pub mod sinks;
