//! Terminal front end
//!
//! Structure:
//! - `args`: command-line surface
//! - `display`: panels printed before and after a run
//! - `progress`: indicatif progress reporter
//! - `prompt`: confirmation question

pub mod args;
pub mod display;
pub mod progress;
pub mod prompt;
