// Engine library root: loading, cohort alignment, comparison and rendering of
// the safras dashboard. The `safras` binary is a thin shell over `cli::run`.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod render;
pub mod services;
