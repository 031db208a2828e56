//! buildmend library crate
//!
//! Exposes the repair-loop modules so tests and external tooling can
//! exercise the engine without going through CLI startup.

pub mod apply;
pub mod artifacts;
pub mod changeset;
pub mod commands;
pub mod config;
pub mod gradle;
pub mod llm;
pub mod repair;
pub mod sandbox;
pub mod util;
pub mod validate;
