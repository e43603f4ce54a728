pub mod epoch;
pub mod pipeline;

pub use epoch::*;
pub use pipeline::*;
