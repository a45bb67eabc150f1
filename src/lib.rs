mod config;
mod message;
mod prefix;
mod rib;
mod router;
mod session;

pub use config::{ConfigError, NeighborSpec, RouterConfig};
pub use router::Router;
pub use session::Endpoints;
