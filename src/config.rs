//! Command-line and environment configuration.

use std::net::SocketAddr;

use clap::Parser;

use crate::logging::LogFormat;

/// Star registry ledger server.
#[derive(Parser, Debug, Clone)]
#[command(name = "star-ledger", version, about)]
pub struct Config {
    /// Address the HTTP API listens on.
    #[arg(long, env = "STAR_LEDGER_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, env = "STAR_LEDGER_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "STAR_LEDGER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}
