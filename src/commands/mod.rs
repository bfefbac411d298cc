//! CLI command implementations for herakles-compute-meter.
//!
//! - `check`: Config and inventory validation
//! - `config`: Configuration file generation
//! - `test`: Collection cycles against the inventory
//! - `generate`: Synthetic inventory generation

pub mod check;
pub mod config;
pub mod generate;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use generate::command_generate_testdata;
pub use test::command_test;
