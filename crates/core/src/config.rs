use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub schedule: ScheduleConfig,
    pub worker: WorkerConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `ANALYTICS_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("ANALYTICS_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            schedule: ScheduleConfig::from_env_profiled(p),
            worker: WorkerConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  schedule:    check_delay={}s, job_result_ttl={}s",
            self.schedule.check_delay_secs,
            self.schedule.job_result_ttl_secs
        );
        tracing::info!(
            "  worker:      poll={}ms, threads={}, batch={}",
            self.worker.poll_interval_ms,
            self.worker.resolved_worker_threads(),
            self.worker.batch_size
        );
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: String::new(),
            schedule: ScheduleConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

// ── Scheduling ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Debounce window between two automatic recomputes of one entity.
    pub check_delay_secs: u64,
    /// How long finished or failed jobs stay fetchable.
    pub job_result_ttl_secs: u64,
}

impl ScheduleConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            check_delay_secs: profiled_env_u64(
                p,
                "ANALYTICS_CHECK_JOB_DELAY",
                defaults.check_delay_secs,
            ),
            job_result_ttl_secs: profiled_env_u64(
                p,
                "ANALYTICS_JOB_RESULT_TTL",
                defaults.job_result_ttl_secs,
            ),
        }
    }

    /// Debounce window; never shorter than one second.
    pub fn check_delay(&self) -> Duration {
        Duration::from_secs(self.check_delay_secs.max(1))
    }

    pub fn job_result_ttl(&self) -> Duration {
        Duration::from_secs(self.job_result_ttl_secs)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            check_delay_secs: 5,
            job_result_ttl_secs: 120,
        }
    }
}

// ── Worker ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub poll_interval_ms: u64,
    /// Threads for metric evaluation. 0 = available parallelism.
    pub worker_threads: usize,
    /// Maximum number of due jobs taken per poll.
    pub batch_size: usize,
}

impl WorkerConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            poll_interval_ms: profiled_env_u64(
                p,
                "ANALYTICS_WORKER_POLL_MS",
                defaults.poll_interval_ms,
            ),
            worker_threads: profiled_env_usize(
                p,
                "ANALYTICS_WORKER_THREADS",
                defaults.worker_threads,
            ),
            batch_size: profiled_env_usize(p, "ANALYTICS_WORKER_BATCH", defaults.batch_size),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.worker_threads
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            worker_threads: 0,
            batch_size: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.profile_label(), "default");
        assert_eq!(config.schedule.check_delay(), Duration::from_secs(5));
        assert_eq!(config.schedule.job_result_ttl(), Duration::from_secs(120));
        assert_eq!(config.worker.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn zero_delay_is_clamped() {
        let schedule = ScheduleConfig { check_delay_secs: 0, job_result_ttl_secs: 0 };
        assert_eq!(schedule.check_delay(), Duration::from_secs(1));
    }

    #[test]
    fn profiled_key_wins_over_plain_key() {
        // Profile name unique to this test so parallel tests don't collide.
        env::set_var("CFGTESTA_ANALYTICS_CHECK_JOB_DELAY", "42");
        env::set_var("ANALYTICS_CHECK_JOB_DELAY", "7");
        let config = Config::for_profile("cfgtesta");
        assert_eq!(config.profile, "CFGTESTA");
        assert_eq!(config.schedule.check_delay_secs, 42);
        env::remove_var("CFGTESTA_ANALYTICS_CHECK_JOB_DELAY");
        env::remove_var("ANALYTICS_CHECK_JOB_DELAY");
    }

    #[test]
    fn unparsable_value_falls_back_to_default() {
        env::set_var("CFGTESTB_ANALYTICS_WORKER_POLL_MS", "soon");
        let config = Config::for_profile("cfgtestb");
        assert_eq!(config.worker.poll_interval_ms, 500);
        env::remove_var("CFGTESTB_ANALYTICS_WORKER_POLL_MS");
    }

    #[test]
    fn resolved_worker_threads() {
        let mut worker = WorkerConfig::default();
        assert!(worker.resolved_worker_threads() > 0);
        worker.worker_threads = 3;
        assert_eq!(worker.resolved_worker_threads(), 3);
    }
}
