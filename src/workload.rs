//! Concurrent workload runner.

use crate::args::WorkloadArgs;
use anyhow::Context;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tenants_cache::{TenantFilter, TenantsCache};
use tracing::{debug, info};

/// Operation repeated by every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    CreateTenants,
    CreateCtis,
    SampleTenants,
    SampleCtis,
}

impl Workload {
    pub fn name(&self) -> &'static str {
        match self {
            Workload::CreateTenants => "create-tenants",
            Workload::CreateCtis => "create-ctis",
            Workload::SampleTenants => "sample-tenants",
            Workload::SampleCtis => "sample-ctis",
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metrics from a workload run.
#[derive(Debug, Clone, Default)]
pub struct WorkloadMetrics {
    /// Number of operations completed.
    pub operations: u64,
    /// Number of workers that ran them.
    pub workers: usize,
    /// Total time taken.
    pub total_duration: Duration,
}

impl WorkloadMetrics {
    /// Calculate operations per second.
    pub fn operations_per_second(&self) -> f64 {
        if self.total_duration.as_secs_f64() > 0.0 {
            self.operations as f64 / self.total_duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

async fn run_once(
    cache: &TenantsCache,
    workload: Workload,
    filter: TenantFilter,
    lookup_cardinality: usize,
    cardinality: u64,
) -> tenants_cache::Result<()> {
    match workload {
        Workload::CreateTenants => {
            cache.create_tenant().await?;
        }
        Workload::CreateCtis => {
            cache.create_cti_entity().await?;
        }
        Workload::SampleTenants => {
            let uuid = cache.get_random_tenant_uuid(lookup_cardinality, filter)?;
            let depth = cache.parent_chain(&uuid).map_or(0, |chain| chain.len());
            let bound = cache.get_tenant_uuid_bound_id(&uuid, cardinality);
            debug!("Sampled tenant {} at depth {} ({})", uuid, depth, bound);
        }
        Workload::SampleCtis => {
            let uuid = cache.get_random_cti_uuid(lookup_cardinality)?;
            debug!("Sampled CTI entity {}", uuid);
        }
    }
    Ok(())
}

/// Run `args.count` operations of `workload` spread over `args.workers` tasks.
///
/// Workers stop claiming operations after the first failure, and that failure
/// is returned.
pub async fn run_workload(
    cache: Arc<TenantsCache>,
    workload: Workload,
    args: &WorkloadArgs,
) -> anyhow::Result<WorkloadMetrics> {
    cache.set_tenants_working_set(args.tenants_working_set);
    cache.set_ctis_working_set(args.ctis_working_set);

    let workers = args.workers.max(1);
    let count = args.count;
    info!("Running {} x {} with {} workers", workload, count, workers);

    let start_time = Instant::now();
    let claimed = Arc::new(AtomicU64::new(0));
    let stop = Arc::new(AtomicBool::new(false));

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let cache = Arc::clone(&cache);
        let claimed = Arc::clone(&claimed);
        let stop = Arc::clone(&stop);
        let filter = args.filter;
        let lookup_cardinality = args.lookup_cardinality;
        let cardinality = args.cardinality;

        handles.push(tokio::spawn(async move {
            let mut done = 0u64;
            while !stop.load(Ordering::Acquire) && claimed.fetch_add(1, Ordering::AcqRel) < count
            {
                let result =
                    run_once(&cache, workload, filter, lookup_cardinality, cardinality).await;
                if let Err(e) = result {
                    stop.store(true, Ordering::Release);
                    return Err(e);
                }
                done += 1;
            }
            Ok(done)
        }));
    }

    let mut operations = 0u64;
    let mut first_error = None;
    for handle in handles {
        match handle.await.context("Workload worker panicked")? {
            Ok(done) => operations += done,
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e).with_context(|| format!("Workload '{workload}' failed"));
    }

    let metrics = WorkloadMetrics {
        operations,
        workers,
        total_duration: start_time.elapsed(),
    };
    info!(
        "Completed {}: {} operations in {:?} ({:.1} ops/s)",
        workload,
        metrics.operations,
        metrics.total_duration,
        metrics.operations_per_second()
    );
    Ok(metrics)
}
