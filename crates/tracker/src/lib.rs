//! Client-side capture, session identity and batched delivery.

pub mod capture;
pub mod config;
pub mod enrichment;
pub mod platform;
pub mod queue;
pub mod session;
pub mod tracker;
pub mod transport;

pub use capture::*;
pub use config::*;
pub use enrichment::*;
pub use platform::*;
pub use queue::*;
pub use session::*;
pub use tracker::*;
pub use transport::*;
