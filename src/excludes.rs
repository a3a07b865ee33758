/// Exclude patterns applied while enumerating workspace files.
///
/// Two shapes cover what group users actually write:
/// - a bare name (`target`, `.git`) or its `**/name` spelling excludes any
///   path containing a segment of that name, at any depth;
/// - a slash path (`vendor/bundle`) excludes that workspace-relative path
///   and everything beneath it; trailing `/`, `/*` or `/**` are accepted
///   and mean the same thing.
///
/// Matching is case-sensitive over forward-slash relative paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeSet {
    names: Vec<String>,
    prefixes: Vec<String>,
}

impl ExcludeSet {
    pub fn parse<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for raw in patterns {
            let normalized = raw.as_ref().trim().replace('\\', "/");
            let trimmed = normalized.trim_start_matches("./").trim_start_matches('/');
            let (global, rest) = match trimmed.strip_prefix("**/") {
                Some(rest) => (true, rest),
                None => (false, trimmed),
            };
            let rest = rest
                .trim_end_matches("/**")
                .trim_end_matches("/*")
                .trim_end_matches('/');
            if rest.is_empty() {
                continue;
            }
            if global || !rest.contains('/') {
                set.names.push(rest.to_string());
            } else {
                set.prefixes.push(rest.to_string());
            }
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.prefixes.is_empty()
    }

    pub fn is_excluded(&self, relative: &str) -> bool {
        if self
            .names
            .iter()
            .any(|name| relative.split('/').any(|segment| segment == name))
        {
            return true;
        }
        self.prefixes.iter().any(|prefix| {
            relative == prefix
                || relative
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_excludes_the_segment_at_any_depth() {
        let set = ExcludeSet::parse([".git", "node_modules"]);
        assert!(set.is_excluded(".git"));
        assert!(set.is_excluded("vendor/node_modules/pkg/index.js"));
        assert!(set.is_excluded("deep/.git/config"));
        assert!(!set.is_excluded("src/main.rs"));
    }

    #[test]
    fn names_match_whole_segments_not_substrings() {
        let set = ExcludeSet::parse(["target"]);
        assert!(set.is_excluded("target/debug/app"));
        assert!(!set.is_excluded("retargeting/notes.md"));
        assert!(!set.is_excluded("src/target.rs"));
    }

    #[test]
    fn slash_paths_exclude_only_their_subtree() {
        let set = ExcludeSet::parse(["vendor/bundle"]);
        assert!(set.is_excluded("vendor/bundle"));
        assert!(set.is_excluded("vendor/bundle/gems/rake"));
        assert!(!set.is_excluded("vendor/bundler"));
        assert!(!set.is_excluded("other/vendor/bundle"));
    }

    #[test]
    fn glob_spellings_collapse_to_the_same_shapes() {
        let set = ExcludeSet::parse(["**/dist", "build/", "out/**", "cache/*"]);
        assert!(set.is_excluded("pkg/dist/bundle.js"));
        assert!(set.is_excluded("build/artifact.bin"));
        assert!(set.is_excluded("out/report.txt"));
        assert!(set.is_excluded("cache/entry"));
    }

    #[test]
    fn blank_patterns_are_dropped() {
        let set = ExcludeSet::parse(["", "  ", "/", "**/"]);
        assert!(set.is_empty());
        assert!(!set.is_excluded("anything"));
    }
}
