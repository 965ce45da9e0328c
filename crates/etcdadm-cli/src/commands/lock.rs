//! `lock` - one acquire attempt, as a reconcile pass would make it

use clap::Args;
use tracing::info;

use etcdadm_lock::EtcdInitMutex;

use crate::{ClusterArgs, Error, Result};

/// Arguments for `lock`
#[derive(Args, Debug)]
pub struct LockArgs {
    #[command(flatten)]
    pub target: ClusterArgs,

    /// Machine to record as holder
    #[arg(long)]
    pub machine: String,
}

/// Attempt to acquire; fails when the lock is not held by `machine` afterwards
///
/// A reclaim of a dead holder also fails here; run the command again to
/// acquire.
pub async fn run(mutex: &EtcdInitMutex, args: &LockArgs) -> Result<()> {
    let cluster = args.target.cluster_ref();
    if mutex.lock(&cluster, &args.machine).await {
        info!(cluster = %cluster.name, machine = %args.machine, "Lock held");
        Ok(())
    } else {
        Err(Error::NotAcquired {
            namespace: cluster.namespace,
            cluster: cluster.name,
            machine: args.machine.clone(),
        })
    }
}
