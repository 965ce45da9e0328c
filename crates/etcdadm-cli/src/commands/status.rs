//! `status` - report the current lock holder

use clap::Args;
use serde_json::json;

use etcdadm_lock::{EtcdInitMutex, LockState};

use crate::{ClusterArgs, Result};

/// Arguments for `status`
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub target: ClusterArgs,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Read the lock and render it
pub async fn run(mutex: &EtcdInitMutex, args: &StatusArgs) -> Result<String> {
    let cluster = args.target.cluster_ref();
    let state = mutex.inspect(&cluster).await?;
    let lock_name = mutex.config().lock_name(&cluster.name);

    if args.json {
        return render_json(&cluster.namespace, &lock_name, &state);
    }
    Ok(render_text(&cluster.namespace, &lock_name, &state))
}

fn render_text(namespace: &str, lock_name: &str, state: &LockState) -> String {
    match state {
        LockState::Unlocked => format!("{}/{}: unlocked", namespace, lock_name),
        LockState::Held(holder) => {
            format!("{}/{}: held by {}", namespace, lock_name, holder.machine_name)
        }
        LockState::Malformed(reason) => format!(
            "{}/{}: malformed ({}); clear it with `etcdadm-lock unlock`",
            namespace, lock_name, reason
        ),
    }
}

fn render_json(namespace: &str, lock_name: &str, state: &LockState) -> Result<String> {
    let value = match state {
        LockState::Unlocked => json!({
            "namespace": namespace,
            "lock": lock_name,
            "state": "unlocked",
        }),
        LockState::Held(holder) => json!({
            "namespace": namespace,
            "lock": lock_name,
            "state": "held",
            "holder": holder,
        }),
        LockState::Malformed(reason) => json!({
            "namespace": namespace,
            "lock": lock_name,
            "state": "malformed",
            "reason": reason,
        }),
    };
    Ok(serde_json::to_string_pretty(&value)?)
}
