//! Status snapshot and side-file writer.
//!
//! The snapshot is the only externally visible artifact of grant state. A
//! background task rewrites it to a JSON file on a fixed interval for
//! consumers such as an uptime page.

use crate::grants::GrantService;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Point-in-time view of grant state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub active_grants: usize,
    /// Active grants per capability name.
    pub by_capability: BTreeMap<String, usize>,
    pub pending_timers: usize,
    pub generated_at: DateTime<Utc>,
}

/// Write `snapshot` to `path` atomically (temp file, then rename).
pub async fn write_snapshot(path: &Path, snapshot: &StatusSnapshot) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(snapshot).map_err(std::io::Error::other)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await
}

/// Spawn the periodic status writer. The first write happens immediately.
pub fn spawn_status_writer(service: GrantService, path: PathBuf, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let snapshot = service.snapshot();
            match write_snapshot(&path, &snapshot).await {
                Ok(()) => debug!(
                    path = %path.display(),
                    active = snapshot.active_grants,
                    "Status file updated"
                ),
                Err(e) => error!(path = %path.display(), error = %e, "Failed to update status file"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::ConfigAuthority;
    use crate::backend::MemoryBackend;
    use crate::config::RolesConfig;
    use crate::grants::{Capability, GrantServiceParams, Principal};
    use std::sync::Arc;

    const ADMIN: Principal = Principal(1);

    async fn read_snapshot(path: &Path) -> Option<StatusSnapshot> {
        let bytes = tokio::fs::read(path).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn snapshot() -> StatusSnapshot {
        StatusSnapshot {
            active_grants: 3,
            by_capability: BTreeMap::from([
                ("command-access".to_string(), 2),
                ("prime".to_string(), 1),
            ]),
            pending_timers: 2,
            generated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("status.json");

        let snap = snapshot();
        write_snapshot(&path, &snap).await.expect("write");
        assert_eq!(read_snapshot(&path).await, Some(snap));
        assert!(!dir.path().join("status.json.tmp").exists());
    }

    #[tokio::test]
    async fn missing_file_reads_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(read_snapshot(&dir.path().join("absent.json")).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn writer_rewrites_on_interval() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("status.json");
        let service = GrantService::new(GrantServiceParams {
            authority: Arc::new(ConfigAuthority::new([ADMIN])),
            backend: Arc::new(MemoryBackend::new()),
            roles: RolesConfig::default(),
            backend_timeout: Duration::from_secs(5),
        });

        let writer = spawn_status_writer(service.clone(), path.clone(), Duration::from_secs(30));

        // First tick is immediate
        tokio::time::sleep(Duration::from_secs(1)).await;
        let first = read_snapshot(&path).await.expect("first write");
        assert_eq!(first.active_grants, 0);

        service
            .grant(ADMIN, Principal(42), "inf", Capability::CommandAccess)
            .await
            .expect("grant");
        tokio::time::sleep(Duration::from_secs(30)).await;
        let second = read_snapshot(&path).await.expect("second write");
        assert_eq!(second.active_grants, 1);
        assert_eq!(second.by_capability["command-access"], 1);

        service
            .revoke(ADMIN, Principal(42), Capability::CommandAccess)
            .await
            .expect("revoke");
        tokio::time::sleep(Duration::from_secs(30)).await;
        let third = read_snapshot(&path).await.expect("third write");
        assert_eq!(third.active_grants, 0);
        assert!(third.generated_at >= first.generated_at);

        writer.abort();
    }
}
