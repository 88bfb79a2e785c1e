//! Deployment capability traits and the topologies that implement them.
//!
//! Each capability is its own trait — lifecycle, process control, pause
//! control, primary discovery — and each deployment topology is one type
//! implementing the capabilities it genuinely has. Composition is by
//! explicit delegation: [`FaultyStorage`] owns an inner deployment and
//! forwards every capability, overriding only the lifecycle. Remote (SSH)
//! topologies live outside this crate; these traits are their boundary.

use crate::error::{Error, Result};
use faultline_types::NodeId;
use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Provisioning and teardown of a node's on-disk state.
pub trait Lifecycle: Send {
    fn provision(&mut self, node: &NodeId) -> impl Future<Output = Result<()>> + Send;
    fn teardown(&mut self, node: &NodeId) -> impl Future<Output = Result<()>> + Send;
}

/// Starting and stopping a node's database process.
pub trait ProcessControl: Send {
    fn start(&mut self, node: &NodeId) -> impl Future<Output = Result<()>> + Send;
    fn kill(&mut self, node: &NodeId) -> impl Future<Output = Result<()>> + Send;
    fn is_running(&mut self, node: &NodeId) -> impl Future<Output = bool> + Send;
}

/// Freezing and thawing a node without killing it.
pub trait PauseControl: Send {
    fn pause(&mut self, node: &NodeId) -> impl Future<Output = Result<()>> + Send;
    fn resume(&mut self, node: &NodeId) -> impl Future<Output = Result<()>> + Send;
}

/// Which node currently claims to be the writable primary.
///
/// `None` means no node makes that claim right now — the signal that
/// recovery is needed.
pub trait PrimaryDiscovery: Send {
    fn primary(&self) -> impl Future<Output = Option<NodeId>> + Send;
}

/// Local-process topology: every node is a child process on this machine.
pub struct LocalDeployment {
    command: String,
    args: Vec<String>,
    data_root: PathBuf,
    children: HashMap<NodeId, Child>,
}

impl LocalDeployment {
    /// A deployment spawning `command args... <node-id>` per node, with
    /// per-node data directories under `data_root`.
    pub fn new(command: impl Into<String>, args: Vec<String>, data_root: PathBuf) -> Self {
        Self { command: command.into(), args, data_root, children: HashMap::new() }
    }

    fn node_dir(&self, node: &NodeId) -> PathBuf {
        self.data_root.join(node.as_str())
    }

    fn pid(&self, node: &NodeId) -> Result<u32> {
        self.children
            .get(node)
            .and_then(Child::id)
            .ok_or_else(|| Error::NotRunning(node.clone()))
    }

    async fn signal(&self, node: &NodeId, signal: &str) -> Result<()> {
        let pid = self.pid(node)?;
        let status = Command::new("kill").arg(signal).arg(pid.to_string()).status().await?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::NotRunning(node.clone()))
        }
    }
}

impl Lifecycle for LocalDeployment {
    async fn provision(&mut self, node: &NodeId) -> Result<()> {
        fs::create_dir_all(self.node_dir(node))?;
        Ok(())
    }

    async fn teardown(&mut self, node: &NodeId) -> Result<()> {
        let dir = self.node_dir(node);
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}

impl ProcessControl for LocalDeployment {
    async fn start(&mut self, node: &NodeId) -> Result<()> {
        if self.children.contains_key(node) {
            return Ok(());
        }
        let child = Command::new(&self.command)
            .args(&self.args)
            .arg(node.as_str())
            .current_dir(&self.data_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Spawn { node: node.clone(), reason: e.to_string() })?;
        self.children.insert(node.clone(), child);

        // Give it a moment, then make sure it did not die on the doorstep.
        sleep(Duration::from_millis(200)).await;
        if self.is_running(node).await {
            debug!(%node, "node process started");
            Ok(())
        } else {
            self.children.remove(node);
            Err(Error::Spawn { node: node.clone(), reason: "process died immediately".into() })
        }
    }

    async fn kill(&mut self, node: &NodeId) -> Result<()> {
        let Some(mut child) = self.children.remove(node) else {
            return Ok(());
        };
        child.kill().await.ok();
        match timeout(Duration::from_secs(5), child.wait()).await {
            Ok(Ok(_)) | Err(_) => Ok(()),
            Ok(Err(e)) => Err(Error::Io(e)),
        }
    }

    async fn is_running(&mut self, node: &NodeId) -> bool {
        match self.children.get_mut(node) {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

impl PauseControl for LocalDeployment {
    async fn pause(&mut self, node: &NodeId) -> Result<()> {
        self.signal(node, "-STOP").await
    }

    async fn resume(&mut self, node: &NodeId) -> Result<()> {
        self.signal(node, "-CONT").await
    }
}

/// Decorator topology: an inner deployment whose node storage lives on a
/// scratch area the harness may scramble between runs, modelling a disk
/// that loses unsynced writes.
///
/// Forwards every capability to the owned inner deployment; only
/// [`Lifecycle`] is overridden.
pub struct FaultyStorage<D> {
    inner: D,
    scratch_root: PathBuf,
}

impl<D> FaultyStorage<D> {
    pub fn new(inner: D, scratch_root: PathBuf) -> Self {
        Self { inner, scratch_root }
    }

    fn node_scratch(&self, node: &NodeId) -> PathBuf {
        self.scratch_root.join(node.as_str())
    }

    /// Drops everything the node wrote to scratch, as a crash of a lossy
    /// disk would.
    pub fn scramble(&self, node: &NodeId) -> Result<()> {
        let dir = self.node_scratch(node);
        if dir.exists() {
            warn!(%node, "scrambling node scratch storage");
            fs::remove_dir_all(&dir)?;
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

impl<D: Lifecycle> Lifecycle for FaultyStorage<D> {
    async fn provision(&mut self, node: &NodeId) -> Result<()> {
        self.inner.provision(node).await?;
        fs::create_dir_all(self.node_scratch(node))?;
        Ok(())
    }

    async fn teardown(&mut self, node: &NodeId) -> Result<()> {
        let dir = self.node_scratch(node);
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        self.inner.teardown(node).await
    }
}

impl<D: ProcessControl> ProcessControl for FaultyStorage<D> {
    async fn start(&mut self, node: &NodeId) -> Result<()> {
        self.inner.start(node).await
    }

    async fn kill(&mut self, node: &NodeId) -> Result<()> {
        self.inner.kill(node).await
    }

    async fn is_running(&mut self, node: &NodeId) -> bool {
        self.inner.is_running(node).await
    }
}

impl<D: PauseControl> PauseControl for FaultyStorage<D> {
    async fn pause(&mut self, node: &NodeId) -> Result<()> {
        self.inner.pause(node).await
    }

    async fn resume(&mut self, node: &NodeId) -> Result<()> {
        self.inner.resume(node).await
    }
}

impl<D: PrimaryDiscovery + Sync> PrimaryDiscovery for FaultyStorage<D> {
    async fn primary(&self) -> Option<NodeId> {
        self.inner.primary().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn node(id: &str) -> NodeId {
        NodeId::from(id)
    }

    #[tokio::test]
    async fn test_provision_and_teardown() {
        let temp = TempDir::new().unwrap();
        let mut deploy = LocalDeployment::new("sleep", vec!["5".into()], temp.path().to_path_buf());

        deploy.provision(&node("n1")).await.unwrap();
        assert!(temp.path().join("n1").exists());

        deploy.teardown(&node("n1")).await.unwrap();
        assert!(!temp.path().join("n1").exists());
    }

    #[tokio::test]
    async fn test_start_kill_cycle() {
        let temp = TempDir::new().unwrap();
        // `sleep` takes the node id as its argument; "30" as the node name
        // keeps the process alive long enough.
        let mut deploy = LocalDeployment::new("sleep", vec![], temp.path().to_path_buf());
        let n = node("30");

        if deploy.start(&n).await.is_ok() {
            assert!(deploy.is_running(&n).await);
            deploy.kill(&n).await.unwrap();
            assert!(!deploy.is_running(&n).await);
        }
    }

    #[tokio::test]
    async fn test_kill_of_stopped_node_is_noop() {
        let temp = TempDir::new().unwrap();
        let mut deploy = LocalDeployment::new("sleep", vec![], temp.path().to_path_buf());
        deploy.kill(&node("n1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_pause_requires_running_process() {
        let temp = TempDir::new().unwrap();
        let mut deploy = LocalDeployment::new("sleep", vec![], temp.path().to_path_buf());
        let result = deploy.pause(&node("n1")).await;
        assert!(matches!(result, Err(Error::NotRunning(_))));
    }

    #[tokio::test]
    async fn test_faulty_storage_overrides_lifecycle_only() {
        let temp = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let inner = LocalDeployment::new("sleep", vec![], temp.path().to_path_buf());
        let mut faulty = FaultyStorage::new(inner, scratch.path().to_path_buf());

        faulty.provision(&node("n1")).await.unwrap();
        // Both the inner data dir and the scratch dir exist.
        assert!(temp.path().join("n1").exists());
        assert!(scratch.path().join("n1").exists());

        std::fs::write(scratch.path().join("n1").join("wal"), b"unsynced").unwrap();
        faulty.scramble(&node("n1")).unwrap();
        assert!(scratch.path().join("n1").exists());
        assert!(!scratch.path().join("n1").join("wal").exists());

        faulty.teardown(&node("n1")).await.unwrap();
        assert!(!temp.path().join("n1").exists());
        assert!(!scratch.path().join("n1").exists());
    }
}
