//! Sliding-window rate limiter keyed by client id.
//!
//! Each client owns a queue of request instants. A check prunes the queue to
//! the current window and admits the request while fewer than
//! `max_requests` remain. A background sweep drops clients whose queues
//! have gone stale so the map does not grow without bound.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: usize },
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: usize,
    requests: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            requests: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn check(&self, client: &str) -> Admission {
        self.check_at(client, Instant::now())
    }

    /// Check and record a request from `client` at `now`.
    ///
    /// Denied requests are not recorded.
    pub fn check_at(&self, client: &str, now: Instant) -> Admission {
        let mut requests = self.lock();
        let bucket = requests.entry(client.to_string()).or_default();
        self.prune(bucket, now);

        if bucket.len() >= self.max_requests {
            let retry_after = bucket
                .front()
                .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
                .unwrap_or(self.window);
            return Admission::Denied { retry_after };
        }

        bucket.push_back(now);
        Admission::Allowed {
            remaining: self.max_requests - bucket.len(),
        }
    }

    /// Prune every client and drop the ones left empty. Returns how many
    /// clients were removed.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut requests = self.lock();
        let before = requests.len();
        requests.retain(|_, bucket| {
            self.prune(bucket, now);
            !bucket.is_empty()
        });
        before - requests.len()
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Number of clients currently tracked.
    pub fn client_count(&self) -> usize {
        self.lock().len()
    }

    /// Run [`sweep`](Self::sweep) every `every` on the tokio runtime until
    /// the returned handle is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.sweep();
                if removed > 0 {
                    log::debug!("Rate-limit sweep dropped {removed} idle clients");
                }
            }
        })
    }

    fn prune(&self, bucket: &mut VecDeque<Instant>, now: Instant) {
        while bucket
            .front()
            .is_some_and(|&t| now.saturating_duration_since(t) >= self.window)
        {
            bucket.pop_front();
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whole seconds until a retry can succeed, rounded up.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
