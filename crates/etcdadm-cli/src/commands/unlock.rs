//! `unlock` - delete a cluster's lock record

use clap::Args;
use tracing::info;

use etcdadm_lock::EtcdInitMutex;

use crate::{ClusterArgs, Error, Result};

/// Arguments for `unlock`
#[derive(Args, Debug)]
pub struct UnlockArgs {
    #[command(flatten)]
    pub target: ClusterArgs,
}

/// Release the lock; succeeds when no record remains
pub async fn run(mutex: &EtcdInitMutex, args: &UnlockArgs) -> Result<()> {
    let cluster = args.target.cluster_ref();
    if mutex.unlock(&cluster).await {
        info!(cluster = %cluster.name, namespace = %cluster.namespace, "Lock released");
        Ok(())
    } else {
        Err(Error::UnlockFailed {
            namespace: cluster.namespace,
            cluster: cluster.name,
        })
    }
}
