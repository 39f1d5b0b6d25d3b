//! Ports layer: trait definitions at the hexagon boundary.

pub mod inbound;
pub mod outbound;

pub use inbound::ItemProvider;
pub use outbound::DataSource;
