//! Port traits the domain talks to.

pub mod config_port;
pub mod price_port;
pub mod report_port;
