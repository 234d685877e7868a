use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Filesystem locations used by the service. Everything mutable lives
/// below `user_data_dir`; `project_root` is only searched for `config.yml`.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub user_data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub vector_db_path: PathBuf,
    pub secrets_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let lookup = |key: &str| env::var(key).ok();
        let project_root = resolve_project_root(lookup);
        let user_data_dir = resolve_data_dir(&project_root, lookup);
        Self::with_data_dir(project_root, user_data_dir)
    }

    /// Lays out all paths below an explicit data directory.
    pub fn with_data_dir(project_root: PathBuf, user_data_dir: PathBuf) -> Self {
        let log_dir = user_data_dir.join("logs");
        let vector_db_path = user_data_dir.join("pagechat_vectors.db");
        let secrets_path = user_data_dir.join("secrets.yaml");

        for dir in [&user_data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            project_root,
            user_data_dir,
            log_dir,
            vector_db_path,
            secrets_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

/// `PAGECHAT_ROOT`, else the working directory.
fn resolve_project_root(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup("PAGECHAT_ROOT")
        .map(PathBuf::from)
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `PAGECHAT_DATA_DIR`, else the XDG data dir, else `.pagechat` in the project root.
fn resolve_data_dir(project_root: &Path, lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = lookup("PAGECHAT_DATA_DIR").filter(|dir| !dir.trim().is_empty()) {
        return PathBuf::from(dir);
    }
    if let Some(xdg) = lookup("XDG_DATA_HOME").filter(|dir| !dir.trim().is_empty()) {
        return PathBuf::from(xdg).join("pagechat");
    }
    match lookup("HOME").filter(|home| !home.trim().is_empty()) {
        Some(home) => PathBuf::from(home).join(".local/share/pagechat"),
        None => project_root.join(".pagechat"),
    }
}
