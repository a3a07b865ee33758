use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// What an active selection session is doing to its target group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Adding,
    Removing,
}

impl SessionMode {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Adding => "add",
            Self::Removing => "remove",
        }
    }
}

/// Which tree a listing is drawn from: a single group's membership, or the
/// whole workspace (add-mode only).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewScope {
    Workspace,
    Group(String),
}

impl ViewScope {
    pub fn group_id(&self) -> Option<&str> {
        match self {
            Self::Workspace => None,
            Self::Group(id) => Some(id),
        }
    }
}

/// Change notification the host reacts to.
///
/// `Structural`: tree shape or item identity may have changed; the host
/// should refresh fully and may re-collapse expanded nodes.
/// `Cosmetic`: only per-item decoration (selection marks) changed; the host
/// must redraw visible items in place without touching expansion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSignal {
    Structural,
    Cosmetic,
}

/// A named collection of workspace files, persisted through a `GroupStore`.
///
/// `origin` is the workspace root the group was created under; groups opened
/// from a different workspace resolve member paths against it as a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<PathBuf>,
}

/// Relative-path delta computed by a session on confirm.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionDelta {
    pub to_add: BTreeSet<String>,
    pub to_remove: BTreeSet<String>,
}

impl SelectionDelta {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// What a confirmed session actually changed, in resource terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmOutcome {
    pub group_id: String,
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl ConfirmOutcome {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Confirm,
    Cancel,
}

impl SessionAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::Confirm => "Confirm",
            Self::Cancel => "Cancel",
        }
    }
}

/// Stable item identity: a pure function of (group id, relative path, mode).
///
/// Hosts key their expansion state on this. Structural signals tell the host
/// identities may have changed; cosmetic signals guarantee they have not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey(String);

impl ItemKey {
    pub fn new(group: Option<&str>, path: &str, mode: Option<SessionMode>) -> Self {
        let scope = group.unwrap_or("workspace");
        match mode {
            Some(mode) => Self(format!("{scope}:{path}#{}", mode.tag())),
            None => Self(format!("{scope}:{path}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One renderable row. A closed union: hosts match on the kind instead of
/// probing optional fields.
///
/// `checked` is `Some` only while a selection session covers the listing;
/// for a directory it reports whether every file underneath is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderItem {
    Group {
        key: ItemKey,
        id: String,
        name: String,
        file_count: usize,
    },
    Directory {
        key: ItemKey,
        scope: ViewScope,
        path: String,
        name: String,
        file_count: usize,
        checked: Option<bool>,
    },
    File {
        key: ItemKey,
        scope: ViewScope,
        path: String,
        name: String,
        resource: Option<PathBuf>,
        checked: Option<bool>,
    },
    ActionButton {
        key: ItemKey,
        action: SessionAction,
    },
}

impl RenderItem {
    pub fn key(&self) -> &ItemKey {
        match self {
            Self::Group { key, .. }
            | Self::Directory { key, .. }
            | Self::File { key, .. }
            | Self::ActionButton { key, .. } => key,
        }
    }

    /// Plain-text label, usable by hosts without a richer renderer.
    pub fn label(&self) -> String {
        match self {
            Self::Group {
                name, file_count, ..
            } => format!("{name} ({file_count})"),
            Self::Directory {
                name,
                file_count,
                checked,
                ..
            } => format!("{}{name}/ ({file_count})", check_mark(*checked)),
            Self::File { name, checked, .. } => format!("{}{name}", check_mark(*checked)),
            Self::ActionButton { action, .. } => action.label().to_string(),
        }
    }
}

fn check_mark(checked: Option<bool>) -> &'static str {
    match checked {
        Some(true) => "[x] ",
        Some(false) => "[ ] ",
        None => "",
    }
}
