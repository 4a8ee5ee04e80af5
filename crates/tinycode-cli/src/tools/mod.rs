//! Built-in tools for the coding agent

mod bash;
mod editor;
pub mod process;
mod todo;

pub use bash::{AutoApprove, BashTool, Confirm, DEFAULT_TIMEOUT};
pub use editor::EditorTool;
pub use process::{ProcessTracker, shutdown_signal};
pub use todo::TodoTool;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tinycode_agent::ToolRegistry;

/// The standard tool set
pub fn registry(
    tracker: ProcessTracker,
    confirm: Arc<dyn Confirm>,
    command_timeout: Duration,
) -> ToolRegistry {
    ToolRegistry::new()
        .with(Arc::new(BashTool::new(tracker, confirm).with_timeout(command_timeout)))
        .with(Arc::new(EditorTool::new()))
        .with(Arc::new(TodoTool::new()))
}

/// Resolve `.` and `..` without touching the filesystem
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Absolute, normalized form of `path` relative to `root`
pub fn resolve_path(root: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&root.join(path))
    }
}

/// Whether `path` lies inside `root` (both normalized)
pub fn within_root(root: &Path, path: &Path) -> bool {
    normalize(path).starts_with(normalize(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        let root = Path::new("/work/project");
        assert_eq!(resolve_path(root, "src/main.rs"), PathBuf::from("/work/project/src/main.rs"));
        assert_eq!(resolve_path(root, "./a/../b.txt"), PathBuf::from("/work/project/b.txt"));
        assert_eq!(resolve_path(root, "/etc/passwd"), PathBuf::from("/etc/passwd"));
    }

    #[test]
    fn test_within_root() {
        let root = Path::new("/work/project");
        assert!(within_root(root, &resolve_path(root, "src/lib.rs")));
        assert!(within_root(root, root));
        assert!(!within_root(root, &resolve_path(root, "../other/file")));
        assert!(!within_root(root, Path::new("/work/project2/file")));
    }

    #[test]
    fn test_registry_names() {
        let registry = registry(ProcessTracker::new(), Arc::new(AutoApprove), DEFAULT_TIMEOUT);
        assert_eq!(registry.names(), vec!["bash", "str_replace_editor", "todo"]);
    }
}
