//! CLI argument definitions shared by every workload.

use clap::{Args, Subcommand};
use std::path::PathBuf;
use tenants_cache::random::MAX_BOUND_CARDINALITY;
use tenants_cache::TenantFilter;
use tenants_store_mysql::MySQLStoreArgs;
use tenants_store_postgresql::PostgreSQLStoreArgs;

/// Arguments common to all workloads.
#[derive(Args, Clone, Debug)]
pub struct WorkloadArgs {
    /// Number of operations to run
    #[arg(long, default_value = "1000")]
    pub count: u64,

    /// Number of concurrent workers
    #[arg(long, default_value = "8")]
    pub workers: usize,

    /// Tenants the sampling workloads draw from (0 = all cached tenants)
    #[arg(long, default_value = "0")]
    pub tenants_working_set: usize,

    /// CTI entities the sampling workloads draw from (0 = all cached entities)
    #[arg(long, default_value = "0")]
    pub ctis_working_set: usize,

    /// Path to a tenant structure YAML file (default: built-in distribution)
    #[arg(long, value_name = "PATH")]
    pub structure: Option<PathBuf>,

    /// Sub-resource ids per tenant drawn alongside each sampled tenant (at most 10^12)
    #[arg(
        long,
        default_value = "1",
        value_parser = clap::value_parser!(u64).range(1..=MAX_BOUND_CARDINALITY)
    )]
    pub cardinality: u64,

    /// Entries each sampling lookup draws from (0 = the configured working set).
    /// Fails when larger than the cached population.
    #[arg(long, default_value = "0")]
    pub lookup_cardinality: usize,

    /// Restrict sampled tenants to one kind ("customer", "partner" or "all")
    #[arg(long, default_value = "all")]
    pub filter: TenantFilter,
}

/// Backing store to run against.
#[derive(Subcommand, Clone, Debug)]
pub enum StoreArgs {
    /// Run against a PostgreSQL database
    #[command(name = "postgresql")]
    PostgreSQL {
        #[command(flatten)]
        args: PostgreSQLStoreArgs,

        #[command(flatten)]
        common: WorkloadArgs,
    },
    /// Run against a MySQL database
    #[command(name = "mysql")]
    MySQL {
        #[command(flatten)]
        args: MySQLStoreArgs,

        #[command(flatten)]
        common: WorkloadArgs,
    },
    /// Run against an in-process store (nothing is persisted)
    #[command(name = "memory")]
    Memory {
        #[command(flatten)]
        common: WorkloadArgs,
    },
}

impl StoreArgs {
    pub fn common(&self) -> &WorkloadArgs {
        match self {
            StoreArgs::PostgreSQL { common, .. }
            | StoreArgs::MySQL { common, .. }
            | StoreArgs::Memory { common } => common,
        }
    }
}
