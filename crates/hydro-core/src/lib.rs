//! Core data types, period resolution, aggregation and baseline comparison
//! for hydrological station readings.
//!
//! Everything in this crate is pure: the backend is only reached through the
//! [`ReadingStore`] trait implemented by the data-access layer.

pub mod baseline;
pub mod compare;
pub mod normalize;
pub mod period;
pub mod pipeline;
pub mod rollups;
pub mod station;
pub mod types;

pub use baseline::*;
pub use compare::*;
pub use normalize::*;
pub use period::*;
pub use pipeline::*;
pub use rollups::*;
pub use station::*;
pub use types::*;
