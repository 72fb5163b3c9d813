//! Common utilities shared across the TBV depositor workspace.

pub mod logging;
