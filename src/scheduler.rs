//! Adaptive batch scheduler.
//!
//! One loop owns all crawl pacing: it samples local CPU and RAM, tunes the
//! worker count and timeout scaling, claims a batch from the queue, fans the
//! batch out to workers, and waits for the whole batch before sampling again.
//! The loop itself never exits; any iteration error is logged and retried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use sysinfo::System;
use tracing::{error, info, warn};

use crate::core::config::MAX_CONCURRENT_REQUESTS;
use crate::core::AppState;
use crate::worker;

/// Baseline worker count the tuner starts from and resets to.
const BASE_CONCURRENCY: usize = 3;
const BASE_TIMEOUT_FACTOR: f64 = 1.0;

/// Every 11th sample hard-resets the tuner to break bad local minima.
const RESET_AFTER_UPDATES: u32 = 10;

const HIGH_CPU_PERCENT: f32 = 80.0;
const HIGH_RAM_PERCENT: f32 = 80.0;
const LOW_CPU_PERCENT: f32 = 50.0;
const LOW_RAM_PERCENT: f32 = 60.0;

const EMPTY_QUEUE_SLEEP: Duration = Duration::from_secs(10);
const BATCH_PAUSE: Duration = Duration::from_secs(3);
const ERROR_SLEEP: Duration = Duration::from_secs(10);

/// Self-tuning concurrency state, mutated only by the scheduler loop.
#[derive(Debug, Clone)]
pub struct DynamicConfig {
    pub concurrency_level: usize,
    pub timeout_factor: f64,
    update_count: u32,
}

impl Default for DynamicConfig {
    fn default() -> Self {
        Self {
            concurrency_level: BASE_CONCURRENCY,
            timeout_factor: BASE_TIMEOUT_FACTOR,
            update_count: 0,
        }
    }
}

impl DynamicConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one resource sample into the tuner. Under pressure the worker
    /// count shrinks and timeouts widen; on an idle box the reverse, up to
    /// the configured ceiling.
    pub fn apply_sample(&mut self, cpu_percent: f32, ram_percent: f32) {
        let old = (self.concurrency_level, self.timeout_factor);

        if cpu_percent > HIGH_CPU_PERCENT || ram_percent > HIGH_RAM_PERCENT {
            self.concurrency_level = self.concurrency_level.saturating_sub(1).max(1);
            self.timeout_factor = (self.timeout_factor + 0.1).min(2.0);
        } else if cpu_percent < LOW_CPU_PERCENT
            && ram_percent < LOW_RAM_PERCENT
            && self.concurrency_level < MAX_CONCURRENT_REQUESTS
        {
            self.concurrency_level = (self.concurrency_level + 1).min(MAX_CONCURRENT_REQUESTS);
            self.timeout_factor = (self.timeout_factor - 0.1).max(0.7);
        }

        if old != (self.concurrency_level, self.timeout_factor) {
            info!(
                concurrency = self.concurrency_level,
                timeout_factor = self.timeout_factor,
                cpu = cpu_percent as f64,
                ram = ram_percent as f64,
                "tuner adjusted"
            );
        }

        self.update_count += 1;
        if self.update_count > RESET_AFTER_UPDATES {
            self.concurrency_level = BASE_CONCURRENCY;
            self.timeout_factor = BASE_TIMEOUT_FACTOR;
            self.update_count = 0;
        }
    }
}

/// CPU usage over a one-second window plus current RAM usage, in percent.
async fn sample_resources(sys: &mut System) -> (f32, f32) {
    sys.refresh_cpu_usage();
    tokio::time::sleep(Duration::from_secs(1)).await;
    sys.refresh_cpu_usage();
    let cpu = sys.global_cpu_usage();

    sys.refresh_memory();
    let total = sys.total_memory();
    let ram = if total == 0 {
        0.0
    } else {
        (sys.used_memory() as f32 / total as f32) * 100.0
    };

    (cpu, ram)
}

/// Run the crawl loop until `shutdown` is set.
///
/// The flag is consulted only between batches, never mid-batch: workers are
/// awaited inline, so every in-flight URL settles its row (visited or
/// errored) before the loop observes the flag and returns.
pub async fn run(state: AppState, shutdown: Arc<AtomicBool>) {
    let mut dynamic = DynamicConfig::new();
    let mut sys = System::new();

    while !shutdown.load(Ordering::SeqCst) {
        if let Err(err) = run_iteration(&state, &mut dynamic, &mut sys).await {
            error!(%err, "scheduler iteration failed");
            tokio::time::sleep(ERROR_SLEEP).await;
        }
    }

    info!("scheduler stopped");
}

async fn run_iteration(
    state: &AppState,
    dynamic: &mut DynamicConfig,
    sys: &mut System,
) -> Result<()> {
    let (cpu, ram) = sample_resources(sys).await;
    dynamic.apply_sample(cpu, ram);

    let batch = state.queue.claim(dynamic.concurrency_level).await?;
    if batch.is_empty() {
        info!("queue empty, sleeping");
        tokio::time::sleep(EMPTY_QUEUE_SLEEP).await;
        return Ok(());
    }

    // Enforce the per-domain daily quota before spending a fetch. Over-quota
    // rows go back unclaimed; they become eligible again after the date rolls.
    let mut runnable = Vec::with_capacity(batch.len());
    for item in batch {
        match state.queue.update_domain_counter(&item.domain).await {
            Ok(quota) if quota.exhausted() => {
                info!(domain = %item.domain, count = quota.count, "domain quota exhausted");
                state.queue.release(item.id).await?;
            }
            Ok(_) => runnable.push(item),
            Err(err) => {
                // Quota bookkeeping must not stall the crawl.
                warn!(domain = %item.domain, %err, "domain counter update failed");
                runnable.push(item);
            }
        }
    }
    if runnable.is_empty() {
        return Ok(());
    }

    info!(batch = runnable.len(), "dispatching workers");
    let timeout_factor = dynamic.timeout_factor;
    stream::iter(runnable)
        .for_each_concurrent(None, |item| async move {
            worker::process_url(state, &item, timeout_factor).await;
        })
        .await;

    tokio::time::sleep(BATCH_PAUSE).await;
    Ok(())
}
