//! Sliding-window request statistics

use super::config::StatsConfig;
use super::holder::StatsHolder;
use super::sample::RequestSample;
use super::snapshot::{
    compute_snapshot, fingerprint, round_to, AggregatedStats, ExtendedMetrics, ExtendedStats,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Last computed summary and the window state it was computed from.
struct Memo {
    generation: u64,
    fingerprint: u64,
    stats: Arc<AggregatedStats>,
}

/// Everything guarded by the aggregator's single lock.
struct Window {
    samples: VecDeque<RequestSample>,
    total: u64,
    success: u64,
    /// Bumped on every mutation; a memo from an older generation is stale.
    generation: u64,
    memo: Option<Memo>,
    last_publish: Option<Instant>,
    started: Instant,
}

/// Running counters copied out of the lock.
struct Counters {
    total: u64,
    success: u64,
    window_size: usize,
    started: Instant,
}

impl Counters {
    fn read(window: &Window) -> Self {
        Self {
            total: window.total,
            success: window.success,
            window_size: window.samples.len(),
            started: window.started,
        }
    }
}

/// Bounded window of recent samples with running counters and a cached
/// summary.
///
/// Recording is O(1) under the lock. Summaries are computed from a copy of
/// the window outside the lock, and only when the window content changed
/// since the last computation. A window that moved during that computation
/// is summarized again under the lock before it is cached.
pub struct StatsAggregator {
    config: StatsConfig,
    holder: Arc<StatsHolder>,
    window: Mutex<Window>,
    computations: AtomicU64,
}

impl StatsAggregator {
    /// Create an aggregator publishing into `holder`.
    pub fn new(config: StatsConfig, holder: Arc<StatsHolder>) -> Self {
        let window = Window {
            samples: VecDeque::with_capacity(config.max_records),
            total: 0,
            success: 0,
            generation: 0,
            memo: None,
            last_publish: None,
            started: Instant::now(),
        };

        Self {
            config,
            holder,
            window: Mutex::new(window),
            computations: AtomicU64::new(0),
        }
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// The holder this aggregator publishes into.
    pub fn holder(&self) -> &Arc<StatsHolder> {
        &self.holder
    }

    fn lock(&self) -> MutexGuard<'_, Window> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a sample, update the counters, and publish when due.
    ///
    /// Publication happens on every `publish_every`-th request, when the
    /// holder is still empty, or when the previous publication is older than
    /// `publish_after`.
    pub fn record(&self, sample: RequestSample) {
        let status = sample.status;
        let error_url = self.config.is_error(status).then(|| sample.url.clone());

        let publish = {
            let mut window = self.lock();
            if window.samples.len() >= self.config.max_records {
                window.samples.pop_front();
            }
            window.samples.push_back(sample);

            window.total += 1;
            if self.config.is_success(status) {
                window.success += 1;
            }
            window.generation = window.generation.wrapping_add(1);

            let due = window.total % self.config.publish_every == 0
                || !self.holder.is_populated()
                || window
                    .last_publish
                    .is_some_and(|at| at.elapsed() > self.config.publish_after);
            if due {
                window.last_publish = Some(Instant::now());
            }
            due
        };

        if let Some(url) = error_url {
            self.holder.record_status(status, url);
        }

        if publish {
            let stats = self.extended_stats();
            tracing::debug!(
                total = stats.extended_metrics.total_requests_processed,
                window = stats.extended_metrics.window_size,
                "publishing request stats"
            );
            self.holder.update(stats);
        }
    }

    /// Summary of the current window.
    ///
    /// Served from cache while the window is unchanged.
    pub fn snapshot(&self) -> Arc<AggregatedStats> {
        self.summarize().0
    }

    /// Summary plus the counters read in the same critical section that
    /// validated or stored it.
    fn summarize(&self) -> (Arc<AggregatedStats>, Counters) {
        let (generation, samples, memo) = {
            let window = self.lock();
            if let Some(memo) = &window.memo {
                if memo.generation == window.generation {
                    return (memo.stats.clone(), Counters::read(&window));
                }
            }
            let samples: Vec<RequestSample> = window.samples.iter().cloned().collect();
            let memo = window
                .memo
                .as_ref()
                .map(|memo| (memo.fingerprint, memo.stats.clone()));
            (window.generation, samples, memo)
        };

        let mut digest = fingerprint(&samples);
        let mut stats = match memo {
            Some((previous, stats)) if previous == digest => stats,
            _ => {
                self.computations.fetch_add(1, Ordering::Relaxed);
                Arc::new(compute_snapshot(&samples, self.config.slowest_count))
            }
        };

        let mut window = self.lock();
        if window.generation != generation {
            // Recorded into while computing; summarize what is there now.
            let samples = window.samples.make_contiguous();
            let current = fingerprint(samples);
            if current != digest {
                self.computations.fetch_add(1, Ordering::Relaxed);
                stats = Arc::new(compute_snapshot(samples, self.config.slowest_count));
                digest = current;
            }
        }
        window.memo = Some(Memo {
            generation: window.generation,
            fingerprint: digest,
            stats: stats.clone(),
        });
        (stats, Counters::read(&window))
    }

    /// Window summary plus running counters.
    ///
    /// Both halves describe the same window state.
    pub fn extended_stats(&self) -> ExtendedStats {
        let (basic_stats, counters) = self.summarize();

        let uptime = counters.started.elapsed().as_secs_f64();
        let requests_per_second = if uptime > 0.0 {
            counters.total as f64 / uptime
        } else {
            0.0
        };
        let success_rate = if counters.total > 0 {
            counters.success as f64 / counters.total as f64 * 100.0
        } else {
            0.0
        };

        ExtendedStats {
            basic_stats: basic_stats.as_ref().clone(),
            extended_metrics: ExtendedMetrics {
                total_requests_processed: counters.total,
                successful_requests: counters.success,
                failed_requests: counters.total - counters.success,
                success_rate_percent: round_to(success_rate, 2),
                requests_per_second: round_to(requests_per_second, 3),
                uptime_seconds: round_to(uptime, 2),
                window_size: counters.window_size,
                window_max_size: self.config.max_records,
            },
        }
    }

    /// Clear the window and counters and restart the uptime clock.
    ///
    /// The holder's per-status history is left alone.
    pub fn reset(&self) {
        let mut window = self.lock();
        window.samples.clear();
        window.total = 0;
        window.success = 0;
        window.generation = window.generation.wrapping_add(1);
        window.memo = None;
        window.started = Instant::now();
    }

    /// Number of samples in the window.
    pub fn window_len(&self) -> usize {
        self.lock().samples.len()
    }

    /// Point-in-time copy of the window, oldest first.
    pub fn samples(&self) -> Vec<RequestSample> {
        self.lock().samples.iter().cloned().collect()
    }

    /// How many times a summary was actually computed.
    pub fn computation_count(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for StatsAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsAggregator")
            .field("config", &self.config)
            .field("window_len", &self.window_len())
            .field("computations", &self.computation_count())
            .finish()
    }
}
