use thiserror::Error;

/// Failures surfaced by the data source adapters. Both variants are caught
/// at the responder boundary and turned into envelope responses; they never
/// reach the transport layer unhandled.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The identifier has no contract behind it on this route.
    #[error("token not supported")]
    UnsupportedToken,

    /// The RPC node or scraped page failed or returned garbage.
    #[error("upstream call failed: {0}")]
    Upstream(String),
}
