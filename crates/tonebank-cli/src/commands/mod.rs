//! CLI command implementations.

pub mod banks;
pub mod common;
pub mod inspect;
pub mod render;
