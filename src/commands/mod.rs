//! Operator commands
//!
//! Actions the `herd-monitor` binary exposes, each a thin layer over the
//! dashboard state and services.

pub mod assign;
pub mod insights;
pub mod watch;
