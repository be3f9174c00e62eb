//! Overlay network access.
//!
//! Destinations are named services rather than addresses. A context knows
//! which services this identity may use and turns `(service, identity)` into a
//! connected byte stream.

mod static_overlay;

pub use static_overlay::StaticOverlay;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::OverlayError;

/// Byte stream returned by a successful dial
pub trait OverlayStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> OverlayStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Dial-by-service-name capability
#[allow(async_fn_in_trait)]
pub trait OverlayContext {
    /// Whether `service` is advertised to this context
    fn has_service(&self, service: &str) -> bool;

    /// Open a stream to `identity` through `service`
    async fn dial(
        &self,
        service: &str,
        identity: &str,
    ) -> Result<Box<dyn OverlayStream>, OverlayError>;
}
