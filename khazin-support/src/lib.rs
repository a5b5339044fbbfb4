//! # Khazin Support
//!
//! Helpers shared by the khazin crates that have nothing to do with
//! resolution itself:
//! - rendering type names, resolution chains and registration listings
//! - "did you mean" suggestions for error messages

pub mod rendering;
