use std::path::{Path, PathBuf};

/// Maps absolute resource paths onto workspace-relative, forward-slash
/// strings for tree indexing.
///
/// Resolution fails soft: one unmappable entry must not abort a whole batch,
/// so every strategy that fails falls through to the next and the final
/// fallback is the bare file name. `None` is returned only for paths with no
/// usable segments at all; callers log and skip those.
#[derive(Debug, Clone)]
pub struct PathResolver {
    workspace_root: PathBuf,
    alternate_roots: Vec<PathBuf>,
}

impl PathResolver {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            alternate_roots: Vec::new(),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Replaces the fallback chain of alternate roots, keeping order and
    /// dropping duplicates and the workspace root itself.
    pub fn set_alternate_roots(&mut self, roots: impl IntoIterator<Item = PathBuf>) {
        self.alternate_roots.clear();
        for root in roots {
            if root != self.workspace_root && !self.alternate_roots.contains(&root) {
                self.alternate_roots.push(root);
            }
        }
    }

    /// First success wins: workspace root, then each alternate root, then the
    /// deepest common ancestor with the workspace root (if it has at least
    /// two segments, to skip degenerate filesystem-root matches), then the
    /// bare file name.
    pub fn resolve(&self, resource: &Path) -> Option<String> {
        let segments = segments_of(resource);
        if segments.is_empty() {
            return None;
        }

        let workspace = segments_of(&self.workspace_root);
        if let Some(rel) = relative_to(&segments, &workspace) {
            return Some(rel);
        }
        for root in &self.alternate_roots {
            if let Some(rel) = relative_to(&segments, &segments_of(root)) {
                return Some(rel);
            }
        }

        let common = workspace
            .iter()
            .zip(&segments)
            .take_while(|(a, b)| a == b)
            .count();
        if common >= 2 && common < segments.len() {
            return Some(segments[common..].join("/"));
        }

        segments.last().cloned()
    }
}

/// Backslashes normalize to `/` before any comparison; comparisons are
/// case-sensitive per segment.
fn segments_of(path: &Path) -> Vec<String> {
    path.to_string_lossy()
        .replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.trim().is_empty())
        .map(str::to_string)
        .collect()
}

fn relative_to(path: &[String], root: &[String]) -> Option<String> {
    if root.is_empty() || path.len() <= root.len() {
        return None;
    }
    path.starts_with(root).then(|| path[root.len()..].join("/"))
}
