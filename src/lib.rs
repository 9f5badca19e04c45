pub mod backend;
pub mod build;
pub mod cli;
pub mod constants;
pub mod error;
pub mod logging;
pub mod progress;
pub mod reference;
pub mod solve;
