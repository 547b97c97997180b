//! Supervision of the local payment-node process.

use std::fs;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tracing::*;

const PID_FILE: &str = "node.pid";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StartError {
    #[error("node binary not found at {0}")]
    BinaryMissing(PathBuf),
    #[error("port {0} is already in use")]
    PortConflict(u16),
    #[error("unable to spawn node: {0}")]
    Spawn(String),
    #[error("node did not write its TLS certificate to {0}")]
    TlsTimeout(PathBuf),
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<io::Error> for StartError {
    fn from(e: io::Error) -> Self {
        StartError::Io(e.to_string())
    }
}

/// How to launch the node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOptions {
    pub binary: PathBuf,
    /// per-instance node directories are created below this
    pub datadir: PathBuf,
    /// one of mainnet, testnet, regtest, simnet
    pub network: String,
    pub rpc_port: u16,
    pub peer_port: u16,
    pub rest_port: u16,
    /// passed through verbatim after the computed options
    pub extra_args: Vec<String>,
    /// remove the instance directory when the node is stopped
    pub clear_data_on_stop: bool,
}

impl NodeOptions {
    pub fn node_dir(&self, instance: &str) -> PathBuf {
        self.datadir.join(instance)
    }

    pub fn pid_path(&self, instance: &str) -> PathBuf {
        self.node_dir(instance).join(PID_FILE)
    }

    pub fn ports(&self) -> [u16; 3] {
        [self.rpc_port, self.peer_port, self.rest_port]
    }

    /// The handle a process started for `instance` will have, minus the pid
    pub fn handle_for(&self, instance: &str, pid: u32) -> NodeProcessHandle {
        let node_dir = self.node_dir(instance);
        let macaroon_path = node_dir
            .join("data")
            .join("chain")
            .join("bitcoin")
            .join(&self.network)
            .join("admin.macaroon");
        NodeProcessHandle {
            pid,
            binary: self.binary.clone(),
            instance: instance.to_string(),
            rpc_port: self.rpc_port,
            peer_port: self.peer_port,
            rest_port: self.rest_port,
            tls_cert_path: node_dir.join("tls.cert"),
            tls_key_path: node_dir.join("tls.key"),
            macaroon_path,
            node_dir,
        }
    }

    pub fn command_args(&self, handle: &NodeProcessHandle) -> Vec<String> {
        let mut args = vec![
            format!("--lnddir={}", handle.node_dir.display()),
            format!("--tlscertpath={}", handle.tls_cert_path.display()),
            format!("--tlskeypath={}", handle.tls_key_path.display()),
            format!("--adminmacaroonpath={}", handle.macaroon_path.display()),
            format!("--logdir={}", handle.node_dir.join("logs").display()),
            "--bitcoin.active".to_string(),
            format!("--bitcoin.{}", self.network),
            "--bitcoin.node=neutrino".to_string(),
            format!("--rpclisten=127.0.0.1:{}", handle.rpc_port),
            format!("--listen=0.0.0.0:{}", handle.peer_port),
            format!("--restlisten=127.0.0.1:{}", handle.rest_port),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// A running (or recorded) node process
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NodeProcessHandle {
    pub pid: u32,
    pub binary: PathBuf,
    pub instance: String,
    pub node_dir: PathBuf,
    pub rpc_port: u16,
    pub peer_port: u16,
    pub rest_port: u16,
    pub tls_cert_path: PathBuf,
    pub tls_key_path: PathBuf,
    pub macaroon_path: PathBuf,
}

impl NodeProcessHandle {
    pub fn rpc_endpoint(&self) -> String {
        format!("https://127.0.0.1:{}", self.rpc_port)
    }
}

pub fn check_binary(binary: &Path) -> Result<(), StartError> {
    if binary.is_file() {
        Ok(())
    } else {
        Err(StartError::BinaryMissing(binary.to_path_buf()))
    }
}

/// Fails with the first port that can't be bound on the loopback interface
pub fn check_ports(ports: &[u16]) -> Result<(), StartError> {
    for port in ports {
        if TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, *port)).is_err() {
            return Err(StartError::PortConflict(*port));
        }
    }
    Ok(())
}

pub fn spawn(
    options: &NodeOptions,
    instance: &str,
) -> Result<(NodeProcessHandle, Child), StartError> {
    let placeholder = options.handle_for(instance, 0);
    fs::create_dir_all(&placeholder.node_dir)?;
    let args = options.command_args(&placeholder);
    info!("spawning {} {:?}", options.binary.display(), args);
    let child = Command::new(&options.binary)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(false)
        .spawn()
        .map_err(|e| StartError::Spawn(e.to_string()))?;
    let pid = child.id().ok_or_else(|| StartError::Spawn("process exited at spawn".to_string()))?;
    Ok((options.handle_for(instance, pid), child))
}

pub fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

pub fn write_pid(path: &Path, pid: u32) -> Result<(), StartError> {
    fs::write(path, pid.to_string())?;
    Ok(())
}

pub fn remove_pid(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("could not remove pid file {}: {}", path.display(), e);
        }
    }
}

pub fn is_alive(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Ask the process to shut down, returns false if it was already gone
pub fn terminate(pid: u32) -> bool {
    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => true,
        Err(e) => {
            debug!("SIGTERM to {} failed: {}", pid, e);
            false
        }
    }
}

/// Poll until `path` exists
pub async fn wait_for_file(path: &Path, interval: Duration, attempts: u32) -> bool {
    for _ in 0..attempts {
        if path.exists() {
            return true;
        }
        sleep(interval).await;
    }
    path.exists()
}

/// Poll until a process we don't own has exited
pub async fn wait_for_exit(pid: u32, interval: Duration, attempts: u32) -> bool {
    for _ in 0..attempts {
        if !is_alive(pid) {
            return true;
        }
        sleep(interval).await;
    }
    !is_alive(pid)
}

/// Reap the child in the background and report its exit status
pub fn watch_exit<F>(mut child: Child, on_exit: F)
where
    F: FnOnce(io::Result<ExitStatus>) + Send + 'static,
{
    tokio::spawn(async move {
        let status = child.wait().await;
        on_exit(status);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(dir: &TempDir, binary: PathBuf, rpc_port: u16) -> NodeOptions {
        NodeOptions {
            binary,
            datadir: dir.path().to_path_buf(),
            network: "regtest".to_string(),
            rpc_port,
            peer_port: 0,
            rest_port: 0,
            extra_args: vec!["--debuglevel=info".to_string()],
            clear_data_on_stop: false,
        }
    }

    #[test]
    fn command_args_test() {
        let dir = TempDir::new().unwrap();
        let options = options(&dir, PathBuf::from("/usr/bin/lnd"), 10009);
        let handle = options.handle_for("alice", 42);
        assert_eq!(handle.node_dir, dir.path().join("alice"));
        assert!(handle.macaroon_path.ends_with("data/chain/bitcoin/regtest/admin.macaroon"));
        assert_eq!(handle.rpc_endpoint(), "https://127.0.0.1:10009");

        let args = options.command_args(&handle);
        assert!(args.contains(&"--bitcoin.regtest".to_string()));
        assert!(args.contains(&"--rpclisten=127.0.0.1:10009".to_string()));
        assert!(args.iter().any(|a| a.starts_with("--tlscertpath=") && a.ends_with("tls.cert")));
        assert_eq!(args.last().unwrap(), "--debuglevel=info");
    }

    #[test]
    fn check_binary_test() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("lnd");
        assert_eq!(check_binary(&missing), Err(StartError::BinaryMissing(missing.clone())));
        fs::write(&missing, b"").unwrap();
        assert!(check_binary(&missing).is_ok());
        // directories are not binaries
        assert!(check_binary(dir.path()).is_err());
    }

    #[test]
    fn check_ports_test() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let busy = listener.local_addr().unwrap().port();
        assert_eq!(check_ports(&[busy]), Err(StartError::PortConflict(busy)));

        let free = {
            let l = TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        assert!(check_ports(&[free]).is_ok());
    }

    #[test]
    fn pid_file_test() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PID_FILE);
        assert_eq!(read_pid(&path), None);
        write_pid(&path, 4242).unwrap();
        assert_eq!(read_pid(&path), Some(4242));
        remove_pid(&path);
        assert_eq!(read_pid(&path), None);
        // removing twice is fine
        remove_pid(&path);
    }

    #[test]
    fn is_alive_test() {
        assert!(is_alive(std::process::id()));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_file_test() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tls.cert");
        assert!(!wait_for_file(&path, Duration::from_millis(500), 4).await);
        fs::write(&path, b"cert").unwrap();
        assert!(wait_for_file(&path, Duration::from_millis(500), 4).await);
    }
}
