mod general;
pub mod teloxide;

pub use general::*;
