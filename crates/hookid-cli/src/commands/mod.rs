//! CLI command implementations.
//!
//! This module contains the implementation of each CLI command.

pub mod encode;
pub mod hex_utils;
pub mod identify;
pub mod sections;
pub mod table;
