//! Runtime configuration for the `forge` binary. Every option can be given
//! as a flag or through the environment.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use crate::rate_limit::RateLimiter;
use crate::render::ChromeBackend;

/// Settings for the render backend.
#[derive(Debug, Clone, Args)]
pub struct RenderConfig {
    /// Milliseconds to wait after loading a document before printing.
    #[arg(long, env = "RENDER_SETTLE_MS", default_value_t = 1000)]
    pub settle_ms: u64,

    /// Chrome/Chromium binary; autodetected when unset.
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,
}

impl RenderConfig {
    pub fn backend(&self) -> ChromeBackend {
        ChromeBackend::new(Duration::from_millis(self.settle_ms), self.chrome_path.clone())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Directory served at `/` (landing page and assets).
    #[arg(long, env = "STATIC_DIR", default_value = "public")]
    pub static_dir: PathBuf,

    /// Requests per window allowed on every `/api` route.
    #[arg(long, env = "RATE_LIMIT_GENERAL", default_value_t = 30)]
    pub general_limit: usize,

    /// Requests per window allowed on `/api/convert`.
    #[arg(long, env = "RATE_LIMIT_CONVERT", default_value_t = 5)]
    pub conversion_limit: usize,

    /// Rate-limit window length in seconds.
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 60)]
    pub rate_window_secs: u64,

    /// Seconds between sweeps of idle rate-limit clients.
    #[arg(long, env = "RATE_LIMIT_SWEEP_SECS", default_value_t = 300)]
    pub sweep_interval_secs: u64,

    #[command(flatten)]
    pub render: RenderConfig,
}

impl ServerConfig {
    pub fn general_limiter(&self) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(self.window(), self.general_limit))
    }

    pub fn conversion_limiter(&self) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(self.window(), self.conversion_limit))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }
}
