//! Port traits at every external seam.

pub mod clock_port;
pub mod config_port;
pub mod market_data_port;
pub mod notifier_port;
pub mod universe_port;
