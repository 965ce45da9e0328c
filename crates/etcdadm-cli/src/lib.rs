//! Operator tool for the etcd initialization lock
//!
//! Reads and drives the same lock records as the bootstrap provider. Mostly
//! useful for clearing records the provider will not reclaim on its own, such
//! as ones with an unreadable payload.

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use etcdadm_common::kube_utils::create_client;
use etcdadm_common::telemetry::LogFormat;
use etcdadm_common::DEFAULT_HOLDER_NAMESPACE;
use etcdadm_lock::{ClusterRef, EtcdInitMutex, LockConfig};

/// etcdadm-lock - inspect and manage etcd initialization locks
#[derive(Parser, Debug)]
#[command(name = "etcdadm-lock")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to kubeconfig (defaults to in-cluster or ~/.kube/config)
    #[arg(long, global = true, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Log output format (json or text)
    #[arg(long, global = true, env = "ETCDADM_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    /// Namespace in which holder Machines are looked up
    #[arg(
        long,
        global = true,
        env = "ETCDADM_HOLDER_NAMESPACE",
        default_value = DEFAULT_HOLDER_NAMESPACE
    )]
    pub holder_namespace: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show who holds a cluster's lock
    Status(commands::status::StatusArgs),
    /// Try once to acquire a cluster's lock for a machine
    Lock(commands::lock::LockArgs),
    /// Release a cluster's lock regardless of holder
    Unlock(commands::unlock::UnlockArgs),
}

/// Identifies the cluster a command targets
#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
    /// Cluster name
    #[arg(long)]
    pub cluster: String,

    /// Cluster namespace (where the lock record lives)
    #[arg(long, short = 'n', default_value = "default")]
    pub namespace: String,

    /// Cluster UID, recorded as owner of newly created lock records
    #[arg(long)]
    pub cluster_uid: Option<String>,
}

impl ClusterArgs {
    /// Typed cluster reference
    pub fn cluster_ref(&self) -> ClusterRef {
        let cluster = ClusterRef::new(&self.namespace, &self.cluster);
        match &self.cluster_uid {
            Some(uid) => cluster.with_uid(uid),
            None => cluster,
        }
    }
}

impl Cli {
    /// Lock configuration derived from global flags
    pub fn lock_config(&self) -> LockConfig {
        LockConfig::default().with_holder_namespace(&self.holder_namespace)
    }

    /// Run the CLI command against the configured cluster
    pub async fn run(self) -> Result<()> {
        let client = create_client(self.kubeconfig.as_deref()).await?;
        let mutex = EtcdInitMutex::for_cluster_api(client, self.lock_config());
        self.run_with(&mutex).await
    }

    /// Run the CLI command with an already constructed mutex
    pub async fn run_with(self, mutex: &EtcdInitMutex) -> Result<()> {
        match self.command {
            Commands::Status(args) => {
                println!("{}", commands::status::run(mutex, &args).await?);
                Ok(())
            }
            Commands::Lock(args) => commands::lock::run(mutex, &args).await,
            Commands::Unlock(args) => commands::unlock::run(mutex, &args).await,
        }
    }
}
