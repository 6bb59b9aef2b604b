//! Shared utilities for the ptcgen CLI

pub mod format;
pub mod table;

pub use table::{definition_table, generator_table};
