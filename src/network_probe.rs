//! Network reachability probes
//!
//! Consulted once before staging when the destination lives on a network
//! volume. A probe never fails: every error is reported as "unreachable".

use std::future::Future;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// SMB over TCP, then NetBIOS session service
pub const SMB_PORTS: [u16; 2] = [445, 139];

/// Default probe timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Reachability check for a network destination host.
pub trait NetworkProbe: Send + Sync {
    fn is_reachable(&self, host: &str) -> impl Future<Output = bool> + Send;
}

/// Probe that tries to open a TCP connection to any of a list of ports.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    ports: Vec<u16>,
    timeout: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(SMB_PORTS.to_vec(), DEFAULT_PROBE_TIMEOUT)
    }
}

impl TcpProbe {
    pub fn new(ports: Vec<u16>, timeout: Duration) -> Self {
        Self { ports, timeout }
    }

    async fn check_port(&self, host: &str, port: u16) -> bool {
        let addr = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        };

        match timeout(self.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(_)) => {
                debug!(%addr, "port open");
                true
            }
            Ok(Err(e)) => {
                debug!(%addr, error = %e, "port closed");
                false
            }
            Err(_) => {
                debug!(%addr, "connect timed out");
                false
            }
        }
    }
}

impl NetworkProbe for TcpProbe {
    fn is_reachable(&self, host: &str) -> impl Future<Output = bool> + Send {
        let host = host.trim().to_string();
        async move {
            if host.is_empty() {
                warn!("empty host provided for probe");
                return false;
            }

            for port in &self.ports {
                if self.check_port(&host, *port).await {
                    return true;
                }
            }

            warn!(%host, ports = ?self.ports, "no service answered");
            false
        }
    }
}

/// Probe that sends a single ICMP echo through the system `ping` command.
#[derive(Debug, Clone)]
pub struct PingProbe {
    timeout: Duration,
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl PingProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn command(&self, host: &str) -> Command {
        let secs = self.timeout.as_secs().max(1);
        let mut cmd = Command::new("ping");
        if cfg!(windows) {
            cmd.arg("-n").arg("1").arg("-w").arg((secs * 1000).to_string());
        } else {
            cmd.arg("-c").arg("1").arg("-W").arg(secs.to_string());
        }
        cmd.arg(host)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

impl NetworkProbe for PingProbe {
    fn is_reachable(&self, host: &str) -> impl Future<Output = bool> + Send {
        let host = host.trim().to_string();
        async move {
            if host.is_empty() {
                warn!("empty host provided for ping");
                return false;
            }

            // The subprocess gets a little longer than its own -W deadline.
            let deadline = self.timeout + Duration::from_secs(2);
            match timeout(deadline, self.command(&host).status()).await {
                Ok(Ok(status)) if status.success() => {
                    debug!(%host, "ping succeeded");
                    true
                }
                Ok(Ok(status)) => {
                    warn!(%host, code = ?status.code(), "ping failed");
                    false
                }
                Ok(Err(e)) => {
                    warn!(%host, error = %e, "ping command could not run");
                    false
                }
                Err(_) => {
                    warn!(%host, "ping timed out");
                    false
                }
            }
        }
    }
}
