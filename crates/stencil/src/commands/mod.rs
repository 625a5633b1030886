//! Command implementations for the Stencil CLI
//!
//! Each command module handles the CLI interface and delegates to
//! stencil-engine for actual implementation.

pub mod generate;
pub mod show;
