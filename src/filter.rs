use crate::tree::{NodeKind, TreeIndex, TreeNode};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Filters a tree by case-insensitive substring match against node names
/// (never full paths).
///
/// A directory survives when its own name matches or any descendant does.
/// A directory whose own name matches but whose children all missed keeps
/// its entire contents: matching a directory reveals it wholesale. Files
/// survive only on a direct name match. Ancestor chains of every match are
/// preserved. An empty query borrows the input untouched.
pub fn filter_index<'a>(index: &'a TreeIndex, query: &str) -> Cow<'a, TreeIndex> {
    if query.is_empty() {
        return Cow::Borrowed(index);
    }

    let needle = query.to_lowercase();
    let roots: BTreeMap<String, TreeNode> = index
        .root_map()
        .iter()
        .filter_map(|(name, node)| filter_node(node, &needle).map(|kept| (name.clone(), kept)))
        .collect();
    Cow::Owned(TreeIndex::from_roots(roots))
}

fn filter_node(node: &TreeNode, needle: &str) -> Option<TreeNode> {
    let name_matches = node.name.to_lowercase().contains(needle);
    match node.kind {
        NodeKind::File => name_matches.then(|| node.clone()),
        NodeKind::Directory => {
            let kept: BTreeMap<String, TreeNode> = node
                .children
                .iter()
                .filter_map(|(name, child)| {
                    filter_node(child, needle).map(|kept| (name.clone(), kept))
                })
                .collect();

            if !kept.is_empty() {
                Some(TreeNode {
                    name: node.name.clone(),
                    path: node.path.clone(),
                    kind: node.kind,
                    resource: node.resource.clone(),
                    children: kept,
                })
            } else if name_matches {
                Some(node.clone())
            } else {
                None
            }
        }
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
    fn empty_query_is_the_identity_without_a_copy() {
        let tree = build(&["a/b.txt"]);
        assert!(matches!(filter_index(&tree, ""), Cow::Borrowed(_)));
    }

    #[test]
    fn ancestors_of_a_deep_match_are_preserved() {
        let tree = build(&["top/mid/deep/report.csv", "top/other.txt"]);
        let filtered = filter_index(&tree, "report");

        assert!(filtered.find("top").is_some());
        assert!(filtered.find("top/mid").is_some());
        assert!(filtered.find("top/mid/deep").is_some());
        assert!(filtered.find("top/mid/deep/report.csv").is_some());
        assert!(filtered.find("top/other.txt").is_none());
    }

    #[test]
    fn matching_is_case_insensitive_on_names_only() {
        let tree = build(&["src/Parser.rs", "src/lexer.rs"]);
        let filtered = filter_index(&tree, "PARS");
        assert!(filtered.find("src/Parser.rs").is_some());
        assert!(filtered.find("src/lexer.rs").is_none());

        // "src/lex" is a path substring, not a name substring.
        assert!(filter_index(&tree, "src/lex").find("src/lexer.rs").is_none());
    }

    #[test]
    fn matched_directory_with_no_matching_children_keeps_everything() {
        let tree = build(&["assets/logo.png", "assets/fonts/mono.ttf", "src/main.rs"]);
        let filtered = filter_index(&tree, "assets");

        assert!(filtered.find("assets/logo.png").is_some());
        assert!(filtered.find("assets/fonts/mono.ttf").is_some());
        assert!(filtered.find("src").is_none());
    }

    #[test]
    fn matched_directory_with_matching_children_keeps_only_those() {
        // "doc" matches the directory and one file inside it.
        let tree = build(&["docs/doc-index.md", "docs/changelog.md"]);
        let filtered = filter_index(&tree, "doc");

        assert!(filtered.find("docs/doc-index.md").is_some());
        assert!(filtered.find("docs/changelog.md").is_none());
    }

    #[test]
    fn no_match_yields_an_empty_tree() {
        let tree = build(&["a/b.txt"]);
        let filtered = filter_index(&tree, "zzz");
        assert!(filtered.is_empty());
        assert_eq!(filtered.file_count(), 0);
    }
}
