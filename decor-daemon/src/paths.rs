use std::path::{Path, PathBuf};

pub use decor_core::manifest::{decor_root, sources_dir_at as sources_dir};

pub const DAEMON_LABEL: &str = "dev.decor.daemon";
pub const DAEMON_SOCKET: &str = "decor.sock";

pub fn run_dir(home: &Path) -> PathBuf {
    decor_root(home).join("run")
}

pub fn socket_path(home: &Path) -> PathBuf {
    decor_root(home).join(DAEMON_SOCKET)
}
