use crate::domain::{RenderItem, ViewScope};
use std::collections::HashMap;
use tracing::debug;

/// Cache key for one materialized listing: which tree, which directory
/// within it (empty string for the tree root).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub scope: ViewScope,
    pub dir: String,
}

impl CacheKey {
    pub fn new(scope: ViewScope, dir: impl Into<String>) -> Self {
        Self {
            scope,
            dir: dir.into(),
        }
    }
}

/// Memoized render-ready item lists.
///
/// No per-key expiry: the only invalidation is wholesale, on structural
/// change. While a selection session is active the engine does not consult
/// this cache at all — toggles change selection marks without changing tree
/// shape, so a hit would serve stale decoration.
#[derive(Debug, Default)]
pub struct RenderCache {
    entries: HashMap<CacheKey, Vec<RenderItem>>,
}

impl RenderCache {
    pub fn get(&self, key: &CacheKey) -> Option<&[RenderItem]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn put(&mut self, key: CacheKey, items: Vec<RenderItem>) {
        self.entries.insert(key, items);
    }

    pub fn invalidate_all(&mut self) {
        if !self.entries.is_empty() {
            debug!(entries = self.entries.len(), "render cache invalidated");
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ItemKey;

    fn item(path: &str) -> RenderItem {
        RenderItem::File {
            key: ItemKey::new(None, path, None),
            scope: ViewScope::Workspace,
            path: path.to_string(),
            name: path.to_string(),
            resource: None,
            checked: None,
        }
    }

    #[test]
    fn put_then_get_round_trips_per_key() {
        let mut cache = RenderCache::default();
        let key = CacheKey::new(ViewScope::Group("g1".to_string()), "src");
        assert!(cache.get(&key).is_none());

        cache.put(key.clone(), vec![item("src/a.rs")]);
        assert_eq!(cache.get(&key).map(<[RenderItem]>::len), Some(1));
    }

    #[test]
    fn writes_to_one_key_leave_other_groups_untouched() {
        let mut cache = RenderCache::default();
        let g1 = CacheKey::new(ViewScope::Group("g1".to_string()), "");
        let g2 = CacheKey::new(ViewScope::Group("g2".to_string()), "");
        cache.put(g1.clone(), vec![item("a.txt")]);
        cache.put(g2.clone(), vec![item("b.txt")]);

        cache.put(g1.clone(), vec![item("a.txt"), item("c.txt")]);
        assert_eq!(cache.get(&g2).map(<[RenderItem]>::len), Some(1));
    }

    #[test]
    fn invalidate_all_clears_every_entry() {
        let mut cache = RenderCache::default();
        cache.put(CacheKey::new(ViewScope::Workspace, ""), vec![item("a")]);
        cache.put(
            CacheKey::new(ViewScope::Group("g".to_string()), "x"),
            vec![item("x/y")],
        );
        assert_eq!(cache.len(), 2);

        cache.invalidate_all();
        assert!(cache.is_empty());
    }
}
