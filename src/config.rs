//! Configuration for Wheelhouse
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

use crate::settlement::GuardConfig;

/// Wheelhouse - reservation and settlement core for vehicle rentals
#[derive(Parser, Debug, Clone)]
#[command(name = "wheelhouse")]
#[command(about = "Reservation and settlement core for vehicle rentals")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (stub payment gateway, relaxed config)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Payment gateway base URL
    #[arg(long, env = "GATEWAY_URL", default_value = "https://dev.khalti.com/api/v2")]
    pub gateway_url: String,

    /// Payment gateway secret key (required in production)
    #[arg(long, env = "GATEWAY_SECRET_KEY")]
    pub gateway_secret: Option<String>,

    /// URL the gateway redirects back to after payment
    #[arg(long, env = "GATEWAY_RETURN_URL", default_value = "http://localhost:8080/payments/return")]
    pub gateway_return_url: String,

    /// Gateway request timeout in milliseconds
    #[arg(long, env = "GATEWAY_TIMEOUT_MS", default_value = "10000")]
    pub gateway_timeout_ms: u64,

    /// TTL for settlement attempts in the dedup guard, seconds
    #[arg(long, env = "ATTEMPT_TTL_SECS", default_value = "120")]
    pub attempt_ttl_secs: u64,

    /// Settlement attempts allowed per actor within the rate window
    #[arg(long, env = "RATE_LIMIT_ATTEMPTS", default_value = "5")]
    pub rate_limit_attempts: u32,

    /// Sliding rate-limit window, seconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value = "60")]
    pub rate_limit_window_secs: u64,

    /// Guard cleanup interval, seconds
    #[arg(long, env = "GUARD_CLEANUP_SECS", default_value = "30")]
    pub guard_cleanup_secs: u64,

    /// Completion sweep interval, seconds
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value = "60")]
    pub sweep_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Gateway timeout as a Duration
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }

    /// Sweep interval as a Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Guard configuration derived from the arguments
    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            attempt_ttl: Duration::from_secs(self.attempt_ttl_secs),
            rate_limit: self.rate_limit_attempts,
            rate_window: Duration::from_secs(self.rate_limit_window_secs),
            cleanup_interval: Duration::from_secs(self.guard_cleanup_secs),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.gateway_secret.is_none() {
            return Err("GATEWAY_SECRET_KEY is required in production mode".to_string());
        }

        if self.rate_limit_attempts == 0 {
            return Err("RATE_LIMIT_ATTEMPTS must be at least 1".to_string());
        }

        if self.attempt_ttl_secs == 0 {
            return Err("ATTEMPT_TTL_SECS must be positive".to_string());
        }

        Ok(())
    }
}
