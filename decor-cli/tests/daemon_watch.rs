use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use decor_core::{
    manifest::{self, SourceManifest},
    types::{Resource, ResourceGroup, SourceId},
};
use tempfile::TempDir;

fn decor_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_decor"))
}

struct DaemonProcess {
    child: Child,
    home: PathBuf,
}

impl DaemonProcess {
    fn start(home: PathBuf) -> Self {
        let child = Command::new(decor_bin())
            .env("HOME", &home)
            .env("USERPROFILE", &home)
            .args(["daemon", "start"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn daemon");
        Self { child, home }
    }

    fn stop(&mut self) {
        let _ = Command::new(decor_bin())
            .env("HOME", &self.home)
            .env("USERPROFILE", &self.home)
            .args(["daemon", "stop"])
            .status();

        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            sleep(Duration::from_millis(50));
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

fn query(home: &Path, args: &[&str]) -> Option<serde_json::Value> {
    let output = Command::new(decor_bin())
        .env("HOME", home)
        .env("USERPROFILE", home)
        .args(args)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    serde_json::from_slice(&output.stdout).ok()
}

fn daemon_running(home: &Path) -> bool {
    query(home, &["daemon", "status"])
        .and_then(|v| v.get("running").and_then(|r| r.as_bool()))
        .unwrap_or(false)
}

fn decorated_resources(home: &Path, source: &str) -> Vec<String> {
    let Some(value) = query(home, &["daemon", "decorations", "--source", source]) else {
        return vec![];
    };
    value
        .as_array()
        .and_then(|entries| entries.first())
        .and_then(|entry| entry["decorations"].as_array())
        .map(|list| {
            list.iter()
                .filter_map(|d| d["resource"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(100));
    }
    false
}

fn manifest_with(uris: &[&str]) -> SourceManifest {
    let mut manifest = SourceManifest::new("Git");
    manifest.groups.push(ResourceGroup::new(
        "changes",
        uris.iter()
            .map(|uri| Resource::colored(*uri, "gitDecoration.modifiedResourceForeground"))
            .collect(),
    ));
    manifest
}

#[test]
fn manifest_edits_flow_into_daemon_decorations() {
    let home = TempDir::new().expect("home");
    let git = SourceId::from("git");
    manifest::save_manifest_at(home.path(), &git, &manifest_with(&["file:///a"]))
        .expect("seed manifest");

    let mut daemon = DaemonProcess::start(home.path().to_path_buf());
    assert!(
        wait_until(Duration::from_secs(5), || daemon_running(home.path())),
        "daemon did not report running state in time",
    );
    assert_eq!(decorated_resources(home.path(), "git"), vec!["file:///a"]);

    manifest::save_manifest_at(home.path(), &git, &manifest_with(&["file:///b"]))
        .expect("update manifest");
    assert!(
        wait_until(Duration::from_secs(10), || {
            decorated_resources(home.path(), "git") == vec!["file:///b".to_string()]
        }),
        "daemon did not pick up the manifest change in time",
    );

    manifest::remove_manifest_at(home.path(), &git).expect("remove manifest");
    assert!(
        wait_until(Duration::from_secs(10), || {
            query(home.path(), &["daemon", "status"])
                .and_then(|v| v["sources"].as_array().map(Vec::len))
                == Some(0)
        }),
        "daemon did not drop the removed source in time",
    );

    daemon.stop();
    assert!(
        wait_until(Duration::from_secs(2), || !decor_daemon::paths::socket_path(
            home.path()
        )
        .exists()),
        "socket file should be removed on shutdown",
    );
}
