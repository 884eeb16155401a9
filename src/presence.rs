use tokio::process::Command;
use tracing::{debug, warn};

/// Network-presence signal: is a trusted device reachable right now?
#[allow(async_fn_in_trait)]
pub trait Presence {
    /// First address that answers, or `None`. An empty list is inert.
    async fn first_live(&self, addrs: &[String]) -> Option<String>;
}

/// Probes with the system `ping` binary: a couple of packets, short timeout.
pub struct PingProbe {
    count: u32,
    timeout_secs: u32,
}

impl Default for PingProbe {
    fn default() -> Self {
        Self {
            count: 2,
            timeout_secs: 4,
        }
    }
}

impl PingProbe {
    async fn ping(&self, addr: &str) -> bool {
        let result = Command::new("ping")
            .arg("-c")
            .arg(self.count.to_string())
            .arg("-n")
            .arg("-W")
            .arg(self.timeout_secs.to_string())
            .arg(addr)
            .output()
            .await;
        match result {
            Ok(output) => {
                debug!(addr, code = ?output.status.code(), "ping finished");
                output.status.success()
            }
            Err(e) => {
                warn!(addr, error = %e, "failed to spawn ping");
                false
            }
        }
    }
}

impl Presence for PingProbe {
    async fn first_live(&self, addrs: &[String]) -> Option<String> {
        for addr in addrs {
            if self.ping(addr).await {
                return Some(addr.clone());
            }
        }
        None
    }
}
