use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use kvbench::{Connector, Store, StoreError};
use kvbench_core::BenchConfig;
use rand_distr::{Distribution, Normal};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Knobs for how the mock store misbehaves.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    /// Mean latency added to every data command.
    pub latency: Duration,
    /// Standard deviation around `latency`.
    pub jitter: Duration,
    /// Refuse every connection attempt.
    pub refuse_connection: bool,
    /// Every n-th data command fails with a command error.
    pub fail_every: Option<u64>,
    /// After this many data commands the connection is lost for good.
    pub disconnect_after: Option<u64>,
    /// Data commands above this rate fail, like an overloaded server.
    pub max_ops_per_sec: Option<NonZeroU32>,
    /// `KEYS`/`DEL` fail.
    pub fail_cleanup: bool,
    /// Closing the connection fails.
    pub fail_close: bool,
}

/// Observable state shared between the connector, its connections and the test.
#[derive(Debug, Default)]
pub struct MockState {
    pub strings: HashMap<String, String>,
    pub hashes: HashMap<String, HashMap<String, String>>,
    pub commands: u64,
    pub connections: u64,
    pub closed: u64,
}

impl MockState {
    pub fn key_count(&self) -> usize {
        self.strings.len() + self.hashes.len()
    }
}

/// In-memory [`Connector`] handing out [`MockStore`] connections.
#[derive(Clone, Default)]
pub struct MockConnector {
    behavior: Behavior,
    state: Arc<Mutex<MockState>>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl MockConnector {
    pub fn new(behavior: Behavior) -> Self {
        let limiter = behavior
            .max_ops_per_sec
            .map(|tps| Arc::new(RateLimiter::direct(Quota::per_second(tps))));
        Self {
            behavior,
            state: Arc::new(Mutex::new(MockState::default())),
            limiter,
        }
    }

    /// Shared state, for inspection after a run.
    pub fn state(&self) -> Arc<Mutex<MockState>> {
        self.state.clone()
    }
}

impl Connector for MockConnector {
    type Connection = MockStore;

    async fn connect(&self, config: &BenchConfig) -> Result<MockStore, StoreError> {
        if self.behavior.refuse_connection {
            debug!("Refusing connection to {}", config.address());
            return Err(StoreError::Connect {
                addr: config.address(),
                reason: "Connection refused (os error 111)".to_string(),
            });
        }

        with_state(&self.state, |s| s.connections += 1);
        Ok(MockStore {
            behavior: self.behavior.clone(),
            state: self.state.clone(),
            limiter: self.limiter.clone(),
        })
    }
}

pub struct MockStore {
    behavior: Behavior,
    state: Arc<Mutex<MockState>>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl MockStore {
    /// Shared bookkeeping for every data command: delay, then decide whether it fails.
    async fn command(&self) -> Result<(), StoreError> {
        let delay = self.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let n = with_state(&self.state, |s| {
            s.commands += 1;
            s.commands
        });

        if let Some(limit) = self.behavior.disconnect_after {
            if n > limit {
                return Err(StoreError::Disconnected(
                    "Connection reset by peer (os error 104)".to_string(),
                ));
            }
        }

        if let Some(every) = self.behavior.fail_every {
            if every > 0 && n % every == 0 {
                return Err(StoreError::Command("ERR injected failure".to_string()));
            }
        }

        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                return Err(StoreError::Command("ERR max ops exceeded".to_string()));
            }
        }

        Ok(())
    }

    fn delay(&self) -> Duration {
        let Behavior { latency, jitter, .. } = self.behavior;
        if jitter.is_zero() {
            return latency;
        }

        match Normal::new(latency.as_secs_f64(), jitter.as_secs_f64()) {
            Ok(normal) => {
                let secs: f64 = normal.sample(&mut rand::thread_rng());
                Duration::from_secs_f64(secs.max(0.))
            }
            Err(_) => latency,
        }
    }
}

impl Store for MockStore {
    async fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.command().await?;
        with_state(&self.state, |s| {
            s.strings.insert(key.to_string(), value.to_string());
        });
        Ok(())
    }

    async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        self.command().await?;
        Ok(with_state(&self.state, |s| s.strings.get(key).cloned()))
    }

    async fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.command().await?;
        with_state(&self.state, |s| {
            s.hashes
                .entry(key.to_string())
                .or_default()
                .insert(field.to_string(), value.to_string());
        });
        Ok(())
    }

    async fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.command().await?;
        Ok(with_state(&self.state, |s| {
            s.hashes.get(key).and_then(|h| h.get(field)).cloned()
        }))
    }

    async fn keys(&mut self, pattern: &str) -> Result<Vec<String>, StoreError> {
        if self.behavior.fail_cleanup {
            return Err(StoreError::Command("ERR KEYS is disabled".to_string()));
        }

        Ok(with_state(&self.state, |s| {
            s.strings
                .keys()
                .chain(s.hashes.keys())
                .filter(|k| glob_match(pattern, k))
                .cloned()
                .collect()
        }))
    }

    async fn del(&mut self, keys: &[String]) -> Result<u64, StoreError> {
        if self.behavior.fail_cleanup {
            return Err(StoreError::Command("ERR DEL is disabled".to_string()));
        }

        Ok(with_state(&self.state, |s| {
            keys.iter()
                .filter(|k| s.strings.remove(*k).is_some() | s.hashes.remove(*k).is_some())
                .count() as u64
        }))
    }

    async fn close(self) -> Result<(), StoreError> {
        with_state(&self.state, |s| s.closed += 1);
        if self.behavior.fail_close {
            return Err(StoreError::Disconnected("already closed".to_string()));
        }
        Ok(())
    }
}

fn with_state<R>(state: &Mutex<MockState>, f: impl FnOnce(&mut MockState) -> R) -> R {
    let mut guard = match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    f(&mut guard)
}

/// Glob matching with `*` (any run) and `?` (any single char).
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}
