pub mod overlay;
pub mod paths;

pub use overlay::{OverlayConfig, ServiceDefinition};
