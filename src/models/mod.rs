pub mod stage;
pub mod utterance;

pub use stage::*;
pub use utterance::*;
