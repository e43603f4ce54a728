pub mod client;
pub mod prompts;
pub mod validation;

#[cfg(test)]
pub mod stub;

pub use client::*;
pub use prompts::*;
pub use validation::*;
