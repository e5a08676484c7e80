//! Core data models: API records, joined views, filters, seasons and stats.

mod appearance;
mod bout;
mod filter;
mod ids;
mod record;
mod season;
mod stats;

pub use appearance::*;
pub use bout::*;
pub use filter::*;
pub use ids::*;
pub use record::*;
pub use season::*;
pub use stats::*;
