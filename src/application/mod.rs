//! Application services: the analysis core, the cross-symbol sweep, and
//! the pattern-memory consumer.

pub mod analysis;
pub mod pattern_memory;
pub mod scanner;
