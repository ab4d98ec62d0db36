//! Built-in stages

mod log;

pub use log::{FrontendSummary, LogBackend, LogFrontend};
