//! Adapters behind the domain ports.

pub mod mock;
pub mod stores;
