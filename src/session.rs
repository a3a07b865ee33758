use crate::domain::{SelectionDelta, SessionMode};
use std::collections::BTreeSet;

/// Session-scoped multi-selection over relative paths.
///
/// Lifecycle: `Inactive` → `enter` → mutate → `confirm`/`clear` → `Inactive`.
/// Switching between adding and removing always passes through `Inactive`;
/// the engine force-exits any live session before entering a new one.
/// Mutations touch only this in-memory state — membership is written once,
/// by the engine, from the delta `confirm` computes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SelectionSession {
    #[default]
    Inactive,
    Active(ActiveSelection),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSelection {
    mode: SessionMode,
    group_id: String,
    /// Membership at entry. Adding mode pre-populates `selected` from it so
    /// an untouched confirm is a no-op; removing mode keeps it empty because
    /// nothing is removed by default.
    snapshot: BTreeSet<String>,
    selected: BTreeSet<String>,
}

impl ActiveSelection {
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }
}

impl SelectionSession {
    pub fn enter(
        group_id: impl Into<String>,
        mode: SessionMode,
        membership: impl IntoIterator<Item = String>,
    ) -> Self {
        let snapshot: BTreeSet<String> = match mode {
            SessionMode::Adding => membership.into_iter().collect(),
            SessionMode::Removing => BTreeSet::new(),
        };
        let selected = snapshot.clone();
        Self::Active(ActiveSelection {
            mode,
            group_id: group_id.into(),
            snapshot,
            selected,
        })
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    pub fn active(&self) -> Option<&ActiveSelection> {
        match self {
            Self::Inactive => None,
            Self::Active(active) => Some(active),
        }
    }

    pub fn mode(&self) -> Option<SessionMode> {
        self.active().map(ActiveSelection::mode)
    }

    pub fn group_id(&self) -> Option<&str> {
        self.active().map(ActiveSelection::group_id)
    }

    pub fn is_for_group(&self, id: &str) -> bool {
        self.group_id() == Some(id)
    }

    pub fn is_selected(&self, path: &str) -> bool {
        self.active()
            .is_some_and(|active| active.selected.contains(path))
    }

    pub fn selected_count(&self) -> usize {
        self.active().map_or(0, |active| active.selected.len())
    }

    /// Flips one path. `None` when no session is active, otherwise the new
    /// state of the path.
    pub fn toggle(&mut self, path: &str) -> Option<bool> {
        let Self::Active(active) = self else {
            return None;
        };
        if active.selected.remove(path) {
            Some(false)
        } else {
            active.selected.insert(path.to_string());
            Some(true)
        }
    }

    /// Adds every given path; returns how many actually changed state
    /// (re-selecting an already-selected path counts as zero).
    pub fn select_paths<I, S>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let Self::Active(active) = self else {
            return 0;
        };
        let mut changed = 0;
        for path in paths {
            if active.selected.insert(path.into()) {
                changed += 1;
            }
        }
        changed
    }

    /// Removes every given path; returns how many actually changed state.
    pub fn deselect_paths<I, S>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Self::Active(active) = self else {
            return 0;
        };
        let mut changed = 0;
        for path in paths {
            if active.selected.remove(path.as_ref()) {
                changed += 1;
            }
        }
        changed
    }

    /// An add-mode confirm with nothing selected is a legitimate "remove
    /// every member" request, indistinguishable from "nothing changed"
    /// without an explicit acknowledgment. The engine refuses to proceed
    /// while this is true unless the caller acknowledges.
    pub fn requires_wipe_ack(&self) -> bool {
        self.active().is_some_and(|active| {
            active.mode == SessionMode::Adding
                && active.selected.is_empty()
                && !active.snapshot.is_empty()
        })
    }

    /// Delta against the entry snapshot. In adding mode, additions are
    /// selected paths absent from the snapshot and removals are snapshot
    /// paths no longer selected. In removing mode a checked path is a
    /// removal, so the selection itself is the removal set.
    pub fn confirm(&self) -> Option<SelectionDelta> {
        let active = self.active()?;
        Some(match active.mode {
            SessionMode::Adding => SelectionDelta {
                to_add: active.selected.difference(&active.snapshot).cloned().collect(),
                to_remove: active.snapshot.difference(&active.selected).cloned().collect(),
            },
            SessionMode::Removing => SelectionDelta {
                to_add: BTreeSet::new(),
                to_remove: active.selected.clone(),
            },
        })
    }

    /// Back to `Inactive`, discarding all selection state. No membership
    /// side effects.
    pub fn clear(&mut self) {
        *self = Self::Inactive;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn membership() -> Vec<String> {
        vec!["a/b.txt".to_string(), "c.txt".to_string()]
    }

    #[test]
    fn adding_prepopulates_and_untouched_confirm_is_a_noop() {
        let session = SelectionSession::enter("g1", SessionMode::Adding, membership());
        assert_eq!(session.selected_count(), 2);
        assert!(session.is_selected("a/b.txt"));

        let delta = session.confirm().expect("active session");
        assert!(delta.is_empty());
    }

    #[test]
    fn removing_starts_empty_and_untouched_confirm_is_a_noop() {
        let session = SelectionSession::enter("g1", SessionMode::Removing, membership());
        assert_eq!(session.selected_count(), 0);

        let delta = session.confirm().expect("active session");
        assert!(delta.is_empty());
    }

    #[test]
    fn adding_delta_splits_checked_nonmembers_and_unchecked_members() {
        // Membership {a/b.txt, c.txt}; workspace also has a/d.txt and e.txt.
        let mut session = SelectionSession::enter("g1", SessionMode::Adding, membership());

        assert_eq!(session.toggle("c.txt"), Some(false));
        assert_eq!(session.toggle("a/d.txt"), Some(true));

        let delta = session.confirm().expect("active session");
        assert_eq!(
            delta.to_add.iter().collect::<Vec<_>>(),
            vec![&"a/d.txt".to_string()]
        );
        assert_eq!(
            delta.to_remove.iter().collect::<Vec<_>>(),
            vec![&"c.txt".to_string()]
        );
    }

    #[test]
    fn removing_delta_is_the_checked_set() {
        let mut session = SelectionSession::enter("g1", SessionMode::Removing, membership());
        session.toggle("c.txt");

        let delta = session.confirm().expect("active session");
        assert!(delta.to_add.is_empty());
        assert_eq!(
            delta.to_remove.iter().collect::<Vec<_>>(),
            vec![&"c.txt".to_string()]
        );
    }

    #[test]
    fn bulk_ops_count_only_actual_changes() {
        let mut session = SelectionSession::enter("g1", SessionMode::Adding, membership());

        // a/b.txt is already selected from pre-population.
        let selected = session.select_paths(["a/b.txt".to_string(), "x.txt".to_string()]);
        assert_eq!(selected, 1);

        let deselected = session.deselect_paths(["x.txt", "never-there.txt"]);
        assert_eq!(deselected, 1);
    }

    #[test]
    fn wipe_ack_is_required_only_for_emptied_adding_sessions() {
        let mut session = SelectionSession::enter("g1", SessionMode::Adding, membership());
        assert!(!session.requires_wipe_ack());

        session.deselect_paths(["a/b.txt", "c.txt"]);
        assert!(session.requires_wipe_ack());

        let removing = SelectionSession::enter("g1", SessionMode::Removing, membership());
        assert!(!removing.requires_wipe_ack());

        // A group with no members has nothing to wipe.
        let empty = SelectionSession::enter("g1", SessionMode::Adding, Vec::<String>::new());
        assert!(!empty.requires_wipe_ack());
    }

    #[test]
    fn inactive_session_answers_inertly() {
        let mut session = SelectionSession::default();
        assert!(!session.is_active());
        assert_eq!(session.toggle("a.txt"), None);
        assert_eq!(session.select_paths(["a.txt".to_string()]), 0);
        assert_eq!(session.confirm(), None);
        assert!(!session.requires_wipe_ack());
    }

    #[test]
    fn clear_discards_everything() {
        let mut session = SelectionSession::enter("g1", SessionMode::Adding, membership());
        session.toggle("new.txt");
        session.clear();
        assert_eq!(session, SelectionSession::Inactive);
    }
}
