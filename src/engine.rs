use crate::cache::{CacheKey, RenderCache};
use crate::config::EngineConfig;
use crate::domain::{
    ChangeSignal, ConfirmOutcome, Group, ItemKey, RenderItem, SessionAction, SessionMode,
    ViewScope,
};
use crate::error::{EngineError, Result};
use crate::excludes::ExcludeSet;
use crate::filter::filter_index;
use crate::resolve::PathResolver;
use crate::session::SelectionSession;
use crate::store::{GroupStore, WorkspaceSource};
use crate::tree::{NodeKind, TreeIndex, TreeNode};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::warn;

/// Orchestrates trees, search, the selection session and the render cache
/// over the external stores.
///
/// The engine owns all mutable state; hosts read through `children` (which
/// returns fresh copies) and react to change signals. Everything here is
/// synchronous and runs to completion — the async boundary lives in
/// `worker`, which drives one engine strictly sequentially.
pub struct GroupEngine {
    store: Arc<dyn GroupStore>,
    workspace: Arc<dyn WorkspaceSource>,
    resolver: PathResolver,
    excludes: ExcludeSet,
    /// Snapshot of the persisted groups, updated by `refresh` and by
    /// successful mutations. Unknown-group checks run against this.
    groups: Vec<Group>,
    /// Workspace enumeration taken when an add-mode session enters; the
    /// session works against this snapshot until it ends.
    workspace_files: Option<Vec<PathBuf>>,
    session: SelectionSession,
    cache: RenderCache,
    search: String,
    listeners: Vec<UnboundedSender<ChangeSignal>>,
}

impl GroupEngine {
    pub fn new(
        config: &EngineConfig,
        workspace_root: impl Into<PathBuf>,
        store: Arc<dyn GroupStore>,
        workspace: Arc<dyn WorkspaceSource>,
    ) -> Self {
        Self {
            store,
            workspace,
            resolver: PathResolver::new(workspace_root),
            excludes: ExcludeSet::parse(&config.exclude_paths),
            groups: Vec::new(),
            workspace_files: None,
            session: SelectionSession::Inactive,
            cache: RenderCache::default(),
            search: String::new(),
            listeners: Vec::new(),
        }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn session(&self) -> &SelectionSession {
        &self.session
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    /// Change signals are delivered on an unbounded channel per listener;
    /// closed receivers are dropped on the next emit.
    pub fn subscribe(&mut self) -> UnboundedReceiver<ChangeSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.push(tx);
        rx
    }

    /// Re-reads the persisted groups. Structural: the whole cache goes.
    /// A live session whose group vanished is force-exited.
    pub fn refresh(&mut self) -> Result<()> {
        let groups = self.store.list_groups()?;
        self.resolver
            .set_alternate_roots(groups.iter().filter_map(|group| group.origin.clone()));
        self.groups = groups;

        let stale = self
            .session
            .group_id()
            .map(str::to_string)
            .filter(|id| !self.groups.iter().any(|group| &group.id == id));
        if stale.is_some() {
            self.exit_session_state();
        }

        self.cache.invalidate_all();
        self.emit(ChangeSignal::Structural);
        Ok(())
    }

    /// Items under `parent`, or the top level for `None`: group rows when no
    /// session is active, the active session's root (confirm/cancel buttons
    /// plus the scope tree) otherwise.
    pub fn children(&mut self, parent: Option<&RenderItem>) -> Result<Vec<RenderItem>> {
        match parent {
            None => self.root_items(),
            Some(RenderItem::Group { id, .. }) => {
                let scope = ViewScope::Group(id.clone());
                self.list_dir(&scope, "")
            }
            Some(RenderItem::Directory { scope, path, .. }) => {
                let scope = scope.clone();
                self.list_dir(&scope, path)
            }
            Some(RenderItem::File { .. } | RenderItem::ActionButton { .. }) => Ok(Vec::new()),
        }
    }

    pub fn set_search(&mut self, query: impl Into<String>) -> bool {
        let query = query.into();
        if query == self.search {
            return false;
        }
        self.search = query;
        self.cache.invalidate_all();
        self.emit(ChangeSignal::Structural);
        true
    }

    pub fn create_group(&mut self, name: &str) -> Result<Group> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::EmptyGroupName);
        }
        if self.groups.iter().any(|group| group.name == name) {
            return Err(EngineError::DuplicateGroup(name.to_string()));
        }

        let group = self
            .store
            .create_group(name, Some(self.resolver.workspace_root()))?;
        self.groups.push(group.clone());
        self.cache.invalidate_all();
        self.emit(ChangeSignal::Structural);
        Ok(group)
    }

    pub fn rename_group(&mut self, id: &str, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(EngineError::EmptyGroupName);
        }
        self.require_group(id)?;
        if self
            .groups
            .iter()
            .any(|group| group.name == new_name && group.id != id)
        {
            return Err(EngineError::DuplicateGroup(new_name.to_string()));
        }

        self.store.rename_group(id, new_name)?;
        if let Some(group) = self.groups.iter_mut().find(|group| group.id == id) {
            group.name = new_name.to_string();
        }
        self.cache.invalidate_all();
        self.emit(ChangeSignal::Structural);
        Ok(())
    }

    pub fn delete_group(&mut self, id: &str) -> Result<()> {
        self.require_group(id)?;
        self.store.delete_group(id)?;
        if self.session.is_for_group(id) {
            self.exit_session_state();
        }
        self.groups.retain(|group| group.id != id);
        self.cache.invalidate_all();
        self.emit(ChangeSignal::Structural);
        Ok(())
    }

    /// Starts an add-mode session: membership is re-read for a fresh
    /// snapshot, the workspace is enumerated once, and every member that
    /// resolves is pre-selected so an untouched confirm is a no-op. Any
    /// live session is force-exited first.
    pub fn enter_add_session(&mut self, group_id: &str) -> Result<()> {
        self.exit_session_state();
        self.require_group(group_id)?;

        let members = self.store.members(group_id)?;
        let resolved = self.resolve_members(&members);
        let files = self.workspace.list_files(&self.excludes)?;

        self.update_group_members(group_id, members);
        self.workspace_files = Some(files);
        self.session = SelectionSession::enter(group_id, SessionMode::Adding, resolved);
        self.cache.invalidate_all();
        self.emit(ChangeSignal::Structural);
        Ok(())
    }

    /// Starts a remove-mode session over the group's own tree; nothing is
    /// selected until the user checks it.
    pub fn enter_remove_session(&mut self, group_id: &str) -> Result<()> {
        self.exit_session_state();
        self.require_group(group_id)?;

        let members = self.store.members(group_id)?;
        let resolved = self.resolve_members(&members);

        self.update_group_members(group_id, members);
        self.session = SelectionSession::enter(group_id, SessionMode::Removing, resolved);
        self.cache.invalidate_all();
        self.emit(ChangeSignal::Structural);
        Ok(())
    }

    /// Flips one path's selection. Cosmetic: tree shape is untouched and
    /// cached listings of other scopes stay valid.
    pub fn toggle(&mut self, path: &str) -> Result<bool> {
        match self.session.toggle(path) {
            Some(now_selected) => {
                self.emit(ChangeSignal::Cosmetic);
                Ok(now_selected)
            }
            None => Err(EngineError::NoSession),
        }
    }

    /// Selects every file in the session scope: the whole workspace in
    /// add mode, the group's own tree in remove mode.
    pub fn select_all(&mut self) -> Result<usize> {
        self.select_in_directory("")
    }

    pub fn deselect_all(&mut self) -> Result<usize> {
        self.deselect_in_directory("")
    }

    /// Selects files at `dir` or below; returns how many actually changed.
    pub fn select_in_directory(&mut self, dir: &str) -> Result<usize> {
        let scope = self.session_scope().ok_or(EngineError::NoSession)?;
        let tree = self.tree_for_scope(&scope)?;
        let changed = self.session.select_paths(tree.file_paths_under(dir));
        if changed > 0 {
            self.emit(ChangeSignal::Cosmetic);
        }
        Ok(changed)
    }

    pub fn deselect_in_directory(&mut self, dir: &str) -> Result<usize> {
        let scope = self.session_scope().ok_or(EngineError::NoSession)?;
        let tree = self.tree_for_scope(&scope)?;
        let changed = self.session.deselect_paths(tree.file_paths_under(dir));
        if changed > 0 {
            self.emit(ChangeSignal::Cosmetic);
        }
        Ok(changed)
    }

    /// Applies the session delta to the store.
    ///
    /// An add-mode confirm with nothing selected empties the group; that
    /// requires `acknowledge_remove_all` because it is otherwise
    /// indistinguishable from "nothing changed". On a store failure the
    /// session stays alive, untouched, so the user can retry; the session
    /// ends only on success or cancel.
    pub fn confirm_session(&mut self, acknowledge_remove_all: bool) -> Result<ConfirmOutcome> {
        let group_id = self
            .session
            .group_id()
            .map(str::to_string)
            .ok_or(EngineError::NoSession)?;
        if self.session.requires_wipe_ack() && !acknowledge_remove_all {
            return Err(EngineError::EmptySelection { group: group_id });
        }

        let delta = self.session.confirm().ok_or(EngineError::NoSession)?;
        let group = self.require_group(&group_id)?;

        if delta.is_empty() {
            self.exit_session_state();
            self.cache.invalidate_all();
            self.emit(ChangeSignal::Structural);
            return Ok(ConfirmOutcome {
                group_id,
                ..ConfirmOutcome::default()
            });
        }

        let workspace_tree = self.workspace_tree();
        let mut added = Vec::new();
        for path in &delta.to_add {
            match workspace_tree.find(path).and_then(|node| node.resource.clone()) {
                Some(resource) if self.workspace.is_file(&resource) => added.push(resource),
                Some(_) => warn!(path = %path, "selected file vanished before confirm, skipping"),
                None => warn!(path = %path, "selected path has no workspace resource, skipping"),
            }
        }

        let group_tree = self.group_tree(&group);
        let mut removed = Vec::new();
        for path in &delta.to_remove {
            match group_tree.find(path).and_then(|node| node.resource.clone()) {
                Some(resource) => removed.push(resource),
                None => warn!(path = %path, "removed path has no member resource, skipping"),
            }
        }

        let mut members = group.members.clone();
        members.retain(|member| !removed.contains(member));
        for resource in &added {
            if !members.contains(resource) {
                members.push(resource.clone());
            }
        }
        members.sort();

        self.store.set_members(&group_id, &members)?;

        self.update_group_members(&group_id, members);
        self.exit_session_state();
        self.cache.invalidate_all();
        self.emit(ChangeSignal::Structural);
        Ok(ConfirmOutcome {
            group_id,
            added,
            removed,
        })
    }

    /// Discards the session with no membership side effects. Idempotent.
    pub fn cancel_session(&mut self) {
        if !self.session.is_active() {
            return;
        }
        self.exit_session_state();
        self.cache.invalidate_all();
        self.emit(ChangeSignal::Structural);
    }

    /// An external watcher reports deleted resources; they are dropped from
    /// every group's membership and the changes persisted. Returns how many
    /// membership entries went away.
    pub fn purge_resources(&mut self, deleted: &[PathBuf]) -> Result<usize> {
        let mut dropped = 0;
        for index in 0..self.groups.len() {
            let (id, kept, had) = {
                let group = &self.groups[index];
                let kept: Vec<PathBuf> = group
                    .members
                    .iter()
                    .filter(|member| !deleted.contains(member))
                    .cloned()
                    .collect();
                if kept.len() == group.members.len() {
                    continue;
                }
                (group.id.clone(), kept, group.members.len())
            };
            self.store.set_members(&id, &kept)?;
            dropped += had - kept.len();
            self.groups[index].members = kept;
        }

        if dropped > 0 {
            self.cache.invalidate_all();
            self.emit(ChangeSignal::Structural);
        }
        Ok(dropped)
    }

    fn root_items(&mut self) -> Result<Vec<RenderItem>> {
        let Some(scope) = self.session_scope() else {
            let mut groups: Vec<&Group> = self.groups.iter().collect();
            groups.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
            return Ok(groups
                .into_iter()
                .map(|group| RenderItem::Group {
                    key: ItemKey::new(Some(&group.id), "", None),
                    id: group.id.clone(),
                    name: group.name.clone(),
                    file_count: group.members.len(),
                })
                .collect());
        };

        let mode = self.session.mode();
        let group = self.session.group_id().map(str::to_string);
        let mut items = vec![
            RenderItem::ActionButton {
                key: ItemKey::new(group.as_deref(), "@confirm", mode),
                action: SessionAction::Confirm,
            },
            RenderItem::ActionButton {
                key: ItemKey::new(group.as_deref(), "@cancel", mode),
                action: SessionAction::Cancel,
            },
        ];
        items.extend(self.list_dir(&scope, "")?);
        Ok(items)
    }

    /// Serves one directory listing: recomputed fresh while the session
    /// covers the scope (selection marks change without structural change),
    /// cache-backed otherwise.
    fn list_dir(&mut self, scope: &ViewScope, dir: &str) -> Result<Vec<RenderItem>> {
        if self.session_scope().as_ref() == Some(scope) {
            return self.compute_dir(scope, dir, true);
        }

        let key = CacheKey::new(scope.clone(), dir);
        if let Some(items) = self.cache.get(&key) {
            return Ok(items.to_vec());
        }
        let items = self.compute_dir(scope, dir, false)?;
        self.cache.put(key, items.clone());
        Ok(items)
    }

    fn compute_dir(&self, scope: &ViewScope, dir: &str, decorate: bool) -> Result<Vec<RenderItem>> {
        let tree = self.tree_for_scope(scope)?;
        let filtered = filter_index(&tree, &self.search);
        let nodes: Vec<&TreeNode> = if dir.is_empty() {
            filtered.roots()
        } else {
            filtered
                .find(dir)
                .map(TreeNode::sorted_children)
                .unwrap_or_default()
        };

        let mode = if decorate { self.session.mode() } else { None };
        let group = scope.group_id();
        Ok(nodes
            .into_iter()
            .map(|node| self.item_for_node(node, scope, group, mode))
            .collect())
    }

    fn item_for_node(
        &self,
        node: &TreeNode,
        scope: &ViewScope,
        group: Option<&str>,
        mode: Option<SessionMode>,
    ) -> RenderItem {
        let key = ItemKey::new(group, &node.path, mode);
        match node.kind {
            NodeKind::Directory => {
                let checked = mode.map(|_| {
                    let files = node.file_paths();
                    !files.is_empty() && files.iter().all(|path| self.session.is_selected(path))
                });
                RenderItem::Directory {
                    key,
                    scope: scope.clone(),
                    path: node.path.clone(),
                    name: node.name.clone(),
                    file_count: node.file_count(),
                    checked,
                }
            }
            NodeKind::File => RenderItem::File {
                key,
                scope: scope.clone(),
                path: node.path.clone(),
                name: node.name.clone(),
                resource: node.resource.clone(),
                checked: mode.map(|_| self.session.is_selected(&node.path)),
            },
        }
    }

    /// The tree an active session reads and writes: the whole workspace in
    /// add mode, the target group in remove mode.
    fn session_scope(&self) -> Option<ViewScope> {
        let active = self.session.active()?;
        Some(match active.mode() {
            SessionMode::Adding => ViewScope::Workspace,
            SessionMode::Removing => ViewScope::Group(active.group_id().to_string()),
        })
    }

    fn tree_for_scope(&self, scope: &ViewScope) -> Result<TreeIndex> {
        match scope {
            ViewScope::Workspace => Ok(self.workspace_tree()),
            ViewScope::Group(id) => {
                let group = self
                    .groups
                    .iter()
                    .find(|group| &group.id == id)
                    .ok_or_else(|| EngineError::GroupNotFound(id.clone()))?;
                Ok(self.group_tree(group))
            }
        }
    }

    fn group_tree(&self, group: &Group) -> TreeIndex {
        TreeIndex::build(group.members.iter().filter_map(|member| {
            self.resolve_entry(member)
                .map(|relative| (relative, Some(member.clone())))
        }))
    }

    fn workspace_tree(&self) -> TreeIndex {
        let files = self.workspace_files.as_deref().unwrap_or(&[]);
        TreeIndex::build(files.iter().filter_map(|file| {
            self.resolve_entry(file)
                .map(|relative| (relative, Some(file.clone())))
        }))
    }

    fn resolve_entry(&self, path: &PathBuf) -> Option<String> {
        let resolved = self.resolver.resolve(path);
        if resolved.is_none() {
            warn!(path = %path.display(), "dropping entry that cannot be resolved");
        }
        resolved
    }

    fn resolve_members(&self, members: &[PathBuf]) -> Vec<String> {
        members
            .iter()
            .filter_map(|member| self.resolve_entry(member))
            .collect()
    }

    /// Looks a group up in the snapshot. A miss force-exits any session
    /// pointing at the vanished group before surfacing not-found.
    fn require_group(&mut self, id: &str) -> Result<Group> {
        if let Some(group) = self.groups.iter().find(|group| group.id == id) {
            return Ok(group.clone());
        }
        if self.session.is_for_group(id) {
            self.exit_session_state();
            self.cache.invalidate_all();
            self.emit(ChangeSignal::Structural);
        }
        Err(EngineError::GroupNotFound(id.to_string()))
    }

    fn update_group_members(&mut self, id: &str, members: Vec<PathBuf>) {
        if let Some(group) = self.groups.iter_mut().find(|group| group.id == id) {
            group.members = members;
        }
    }

    fn exit_session_state(&mut self) {
        self.session.clear();
        self.workspace_files = None;
    }

    fn emit(&mut self, signal: ChangeSignal) {
        self.listeners.retain(|listener| listener.send(signal).is_ok());
    }
}
