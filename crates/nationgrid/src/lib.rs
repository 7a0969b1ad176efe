//! Umbrella crate for NationGrid.
//!
//! Re-exports the engine and protocol crates so tools and bots can depend on a
//! single crate name (`nationgrid`).

pub use nationgrid_engine as engine;
pub use nationgrid_protocol as protocol;
