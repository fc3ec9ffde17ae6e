//! Failures that stop the service (or the CLI demo) from starting or serving.
//! Request-level failures never reach this type; handlers answer those
//! themselves.

use std::io;
use std::net::SocketAddr;

use crate::config::ConfigError;
use crate::intake::RelayError;
use crate::telemetry::TelemetryError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    /// The relay client could not be built, or the demo's relay call failed.
    #[error("relay error: {0}")]
    Relay(#[from] RelayError),
    #[error("could not listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("server stopped unexpectedly: {0}")]
    Serve(#[source] io::Error),
}
