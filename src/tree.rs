use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

/// One path segment in an indexed tree.
///
/// `path` is the full relative path from the tree root, `/`-joined, with no
/// leading or trailing slash. Sibling names are unique (children are keyed
/// by segment name); a path string identifies at most one node per tree.
/// Files never have children; directories never carry a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    pub kind: NodeKind,
    pub resource: Option<PathBuf>,
    pub children: BTreeMap<String, TreeNode>,
}

impl TreeNode {
    fn directory(name: &str, path: String) -> Self {
        Self {
            name: name.to_string(),
            path,
            kind: NodeKind::Directory,
            resource: None,
            children: BTreeMap::new(),
        }
    }

    fn file(name: &str, path: String, resource: Option<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            path,
            kind: NodeKind::File,
            resource,
            children: BTreeMap::new(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Recursive count of file descendants. Zero is a valid, displayable
    /// result for a directory; such nodes are never elided.
    pub fn file_count(&self) -> usize {
        match self.kind {
            NodeKind::File => 1,
            NodeKind::Directory => self.children.values().map(TreeNode::file_count).sum(),
        }
    }

    /// Every file path at or beneath this node.
    pub fn file_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_file_paths(self, &mut out);
        out
    }

    /// Display order, applied fresh on every call: directories before files,
    /// case-sensitive ascending names within each kind. Not cached in the
    /// node since filtering changes the effective child set.
    pub fn sorted_children(&self) -> Vec<&TreeNode> {
        let mut children: Vec<&TreeNode> = self.children.values().collect();
        children.sort_by(|a, b| display_order(a, b));
        children
    }
}

fn display_order(a: &TreeNode, b: &TreeNode) -> Ordering {
    match (a.kind, b.kind) {
        (NodeKind::Directory, NodeKind::File) => Ordering::Less,
        (NodeKind::File, NodeKind::Directory) => Ordering::Greater,
        _ => a.name.cmp(&b.name),
    }
}

/// Hierarchical index built from a flat list of relative paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeIndex {
    roots: BTreeMap<String, TreeNode>,
}

impl TreeIndex {
    pub fn build<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Option<PathBuf>)>,
    {
        let mut index = Self::default();
        for (path, resource) in entries {
            index.insert(&path, resource);
        }
        index
    }

    pub(crate) fn from_roots(roots: BTreeMap<String, TreeNode>) -> Self {
        Self { roots }
    }

    pub(crate) fn root_map(&self) -> &BTreeMap<String, TreeNode> {
        &self.roots
    }

    /// Inserts one relative path, creating directory nodes for every segment
    /// but the last and a file node for the last. Re-inserting an existing
    /// path is a no-op. Entries with no usable segments are dropped with a
    /// log line, never raised: one malformed entry must not prevent indexing
    /// the rest.
    pub fn insert(&mut self, path: &str, resource: Option<PathBuf>) {
        let segments: Vec<&str> = path
            .split('/')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect();
        let Some((last, dirs)) = segments.split_last() else {
            debug!(path, "skipping entry with no usable segments");
            return;
        };

        let mut walked = String::new();
        let mut children = &mut self.roots;
        for segment in dirs {
            walked = join_path(&walked, segment);
            let node = children
                .entry((*segment).to_string())
                .or_insert_with(|| TreeNode::directory(segment, walked.clone()));
            if node.kind == NodeKind::File {
                debug!(path, segment, "skipping entry that traverses a file");
                return;
            }
            children = &mut node.children;
        }

        walked = join_path(&walked, last);
        children
            .entry((*last).to_string())
            .or_insert_with(|| TreeNode::file(last, walked, resource));
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Top-level nodes in display order.
    pub fn roots(&self) -> Vec<&TreeNode> {
        let mut roots: Vec<&TreeNode> = self.roots.values().collect();
        roots.sort_by(|a, b| display_order(a, b));
        roots
    }

    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        let mut segments = path.split('/').filter(|segment| !segment.is_empty());
        let mut node = self.roots.get(segments.next()?)?;
        for segment in segments {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    pub fn file_count(&self) -> usize {
        self.roots.values().map(TreeNode::file_count).sum()
    }

    /// Every file path in the tree.
    pub fn file_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        for root in self.roots.values() {
            collect_file_paths(root, &mut out);
        }
        out
    }

    /// File paths located at `dir` or nested under it. An empty `dir` spans
    /// the whole tree; an unknown `dir` yields nothing.
    pub fn file_paths_under(&self, dir: &str) -> Vec<String> {
        if dir.is_empty() {
            return self.file_paths();
        }
        let mut out = Vec::new();
        if let Some(node) = self.find(dir) {
            collect_file_paths(node, &mut out);
        }
        out
    }
}

fn collect_file_paths(node: &TreeNode, out: &mut Vec<String>) {
    match node.kind {
        NodeKind::File => out.push(node.path.clone()),
        NodeKind::Directory => {
            for child in node.children.values() {
                collect_file_paths(child, out);
            }
        }
    }
}

fn join_path(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{base}/{segment}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn build(paths: &[&str]) -> TreeIndex {
        TreeIndex::build(paths.iter().map(|p| (p.to_string(), None)))
    }

    #[test]
    fn builds_nested_directories_and_files() {
        let tree = build(&["x/y/z.txt", "x/w.txt", ""]);

        let x = tree.find("x").expect("root x");
        assert!(x.is_dir());
        assert_eq!(x.children.len(), 2);

        let y = tree.find("x/y").expect("x/y");
        assert!(y.is_dir());
        assert_eq!(y.children.len(), 1);

        let z = tree.find("x/y/z.txt").expect("x/y/z.txt");
        assert_eq!(z.kind, NodeKind::File);
        assert_eq!(z.path, "x/y/z.txt");
        assert_eq!(z.name, "z.txt");

        // The malformed empty entry produced no node.
        assert_eq!(tree.roots().len(), 1);
        assert_eq!(tree.file_count(), 2);
    }

    #[test]
    fn duplicate_paths_yield_a_structurally_identical_tree() {
        let once = build(&["a/b.txt", "c.txt", "a/d/e.txt"]);
        let twice = build(&["a/b.txt", "c.txt", "a/d/e.txt", "a/b.txt", "c.txt"]);
        assert_eq!(once, twice);
    }

    #[test]
    fn first_resource_wins_on_duplicate_insert() {
        let mut tree = TreeIndex::default();
        tree.insert("a.txt", Some(PathBuf::from("/ws/a.txt")));
        tree.insert("a.txt", Some(PathBuf::from("/other/a.txt")));
        assert_eq!(
            tree.find("a.txt").and_then(|n| n.resource.clone()),
            Some(PathBuf::from("/ws/a.txt"))
        );
    }

    #[test]
    fn directories_sort_before_files_then_names_ascend() {
        let tree = build(&["b.txt", "a/x.txt", "z/x.txt", "A.txt", "m/x.txt"]);
        let names: Vec<&str> = tree.roots().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "m", "z", "A.txt", "b.txt"]);
    }

    #[test]
    fn sorted_children_reorders_after_mutation() {
        let mut tree = build(&["d/later.txt"]);
        tree.insert("d/earlier.txt", None);
        let d = tree.find("d").expect("d");
        let names: Vec<&str> = d.sorted_children().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["earlier.txt", "later.txt"]);
    }

    #[test]
    fn file_counts_are_recursive_and_zero_is_valid() {
        let tree = build(&["a/b/c.txt", "a/d.txt", "e.txt"]);
        assert_eq!(tree.find("a").expect("a").file_count(), 2);
        assert_eq!(tree.find("a/b").expect("a/b").file_count(), 1);
        assert_eq!(tree.file_count(), 3);

        let empty = TreeNode {
            name: "hollow".to_string(),
            path: "hollow".to_string(),
            kind: NodeKind::Directory,
            resource: None,
            children: BTreeMap::new(),
        };
        assert_eq!(empty.file_count(), 0);
    }

    #[test]
    fn file_paths_under_scopes_to_the_directory() {
        let tree = build(&["a/b.txt", "a/c/d.txt", "e.txt"]);
        let mut under = tree.file_paths_under("a");
        under.sort();
        assert_eq!(under, vec!["a/b.txt", "a/c/d.txt"]);

        assert_eq!(tree.file_paths_under("missing"), Vec::<String>::new());

        let mut all = tree.file_paths_under("");
        all.sort();
        assert_eq!(all, vec!["a/b.txt", "a/c/d.txt", "e.txt"]);
    }

    #[test]
    fn entry_traversing_a_file_is_skipped() {
        let mut tree = build(&["a"]);
        tree.insert("a/b.txt", None);
        let a = tree.find("a").expect("a");
        assert_eq!(a.kind, NodeKind::File);
        assert!(a.children.is_empty());
    }

    #[test]
    fn whitespace_only_segments_are_discarded() {
        let tree = build(&["  ", "x//y.txt", " /x/ z.txt"]);
        assert_eq!(tree.find("x/y.txt").map(|n| n.kind), Some(NodeKind::File));
        assert_eq!(tree.find("x/z.txt").map(|n| n.kind), Some(NodeKind::File));
        assert_eq!(tree.roots().len(), 1);
    }
}
