use crate::domain::Group;
use crate::excludes::ExcludeSet;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Persistence seam for groups. The engine treats whatever sits behind this
/// trait as the single source of truth for membership; it never mutates
/// membership except through `set_members` with a confirmed delta applied.
pub trait GroupStore: Send + Sync {
    fn list_groups(&self) -> Result<Vec<Group>>;
    fn create_group(&self, name: &str, origin: Option<&Path>) -> Result<Group>;
    fn rename_group(&self, id: &str, new_name: &str) -> Result<()>;
    fn delete_group(&self, id: &str) -> Result<()>;
    fn members(&self, id: &str) -> Result<Vec<PathBuf>>;
    fn set_members(&self, id: &str, members: &[PathBuf]) -> Result<()>;
}

/// Enumeration seam for the workspace. Only consulted for add-mode sessions
/// (the workspace-wide tree) and resource existence checks; the engine never
/// reads file contents or watches for changes.
pub trait WorkspaceSource: Send + Sync {
    fn list_files(&self, excludes: &ExcludeSet) -> Result<Vec<PathBuf>>;
    fn is_file(&self, path: &Path) -> bool;
}

const STORE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct StoreFile {
    version: u32,
    groups: Vec<Group>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            groups: Vec::new(),
        }
    }
}

/// Group store persisted as one JSON file. Saves go through a sibling
/// temporary file and a rename so a crash mid-write cannot truncate the
/// store.
#[derive(Debug, Clone)]
pub struct JsonGroupStore {
    path: PathBuf,
}

impl JsonGroupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StoreFile> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(StoreFile::default());
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read group store: {}", self.path.display())
                });
            }
        };

        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse group store: {}", self.path.display()))
    }

    fn save(&self, file: &StoreFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let body = serde_json::to_string_pretty(file).context("failed to serialize group store")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| {
            format!("failed to move {} into place", self.path.display())
        })?;
        Ok(())
    }
}

impl GroupStore for JsonGroupStore {
    fn list_groups(&self) -> Result<Vec<Group>> {
        Ok(self.load()?.groups)
    }

    fn create_group(&self, name: &str, origin: Option<&Path>) -> Result<Group> {
        let name = name.trim();
        if name.is_empty() {
            bail!("group name must not be empty");
        }

        let mut file = self.load()?;
        if file.groups.iter().any(|group| group.name == name) {
            bail!("a group named {name:?} already exists");
        }

        let group = Group {
            id: unique_id(&file.groups, name),
            name: name.to_string(),
            members: Vec::new(),
            origin: origin.map(Path::to_path_buf),
        };
        file.groups.push(group.clone());
        self.save(&file)?;
        Ok(group)
    }

    fn rename_group(&self, id: &str, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            bail!("group name must not be empty");
        }

        let mut file = self.load()?;
        if file
            .groups
            .iter()
            .any(|group| group.name == new_name && group.id != id)
        {
            bail!("a group named {new_name:?} already exists");
        }
        let Some(group) = file.groups.iter_mut().find(|group| group.id == id) else {
            bail!("group not found: {id}");
        };
        group.name = new_name.to_string();
        self.save(&file)
    }

    fn delete_group(&self, id: &str) -> Result<()> {
        let mut file = self.load()?;
        let before = file.groups.len();
        file.groups.retain(|group| group.id != id);
        if file.groups.len() == before {
            bail!("group not found: {id}");
        }
        self.save(&file)
    }

    fn members(&self, id: &str) -> Result<Vec<PathBuf>> {
        let file = self.load()?;
        let Some(group) = file.groups.iter().find(|group| group.id == id) else {
            bail!("group not found: {id}");
        };
        Ok(group.members.clone())
    }

    fn set_members(&self, id: &str, members: &[PathBuf]) -> Result<()> {
        let mut file = self.load()?;
        let Some(group) = file.groups.iter_mut().find(|group| group.id == id) else {
            bail!("group not found: {id}");
        };
        group.members = members.to_vec();
        self.save(&file)
    }
}

fn slug_of(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "group".to_string()
    } else {
        slug.to_string()
    }
}

fn unique_id(groups: &[Group], name: &str) -> String {
    let base = slug_of(name);
    if !groups.iter().any(|group| group.id == base) {
        return base;
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !groups.iter().any(|group| group.id == candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Recursive filesystem scanner rooted at one workspace directory.
/// Unreadable directories are counted and skipped, never fatal; symlinks are
/// not followed.
#[derive(Debug, Clone)]
pub struct FsWorkspaceSource {
    root: PathBuf,
}

impl FsWorkspaceSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl WorkspaceSource for FsWorkspaceSource {
    fn list_files(&self, excludes: &ExcludeSet) -> Result<Vec<PathBuf>> {
        fs::metadata(&self.root).with_context(|| {
            format!("workspace root is not accessible: {}", self.root.display())
        })?;

        let mut files = Vec::new();
        let mut skipped = 0usize;
        visit_dir(&self.root, &self.root, excludes, &mut files, &mut skipped);
        if skipped > 0 {
            warn!(
                skipped,
                root = %self.root.display(),
                "unreadable entries skipped during workspace scan"
            );
        }
        files.sort();
        Ok(files)
    }

    fn is_file(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|meta| meta.file_type().is_file())
            .unwrap_or(false)
    }
}

fn visit_dir(
    root: &Path,
    dir: &Path,
    excludes: &ExcludeSet,
    out: &mut Vec<PathBuf>,
    skipped: &mut usize,
) {
    let Ok(read_dir) = fs::read_dir(dir) else {
        *skipped += 1;
        return;
    };

    let mut entries: Vec<fs::DirEntry> = read_dir.filter_map(std::result::Result::ok).collect();
    entries.sort_by_key(fs::DirEntry::file_name);

    for entry in entries {
        let path = entry.path();
        let Some(relative) = relative_slash_path(root, &path) else {
            continue;
        };
        if excludes.is_excluded(&relative) {
            continue;
        }
        let Ok(meta) = fs::symlink_metadata(&path) else {
            *skipped += 1;
            continue;
        };
        let file_type = meta.file_type();
        if file_type.is_dir() {
            visit_dir(root, &path, excludes, out, skipped);
        } else if file_type.is_file() {
            out.push(path);
        }
    }
}

fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

/// In-memory store for hosts that manage persistence themselves, and for
/// tests.
#[derive(Debug, Default)]
pub struct MemoryGroupStore {
    groups: Mutex<Vec<Group>>,
}

impl MemoryGroupStore {
    pub fn with_groups(groups: impl IntoIterator<Item = Group>) -> Self {
        Self {
            groups: Mutex::new(groups.into_iter().collect()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Group>> {
        self.groups.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl GroupStore for MemoryGroupStore {
    fn list_groups(&self) -> Result<Vec<Group>> {
        Ok(self.lock().clone())
    }

    fn create_group(&self, name: &str, origin: Option<&Path>) -> Result<Group> {
        let name = name.trim();
        if name.is_empty() {
            bail!("group name must not be empty");
        }
        let mut groups = self.lock();
        if groups.iter().any(|group| group.name == name) {
            bail!("a group named {name:?} already exists");
        }
        let group = Group {
            id: unique_id(&groups, name),
            name: name.to_string(),
            members: Vec::new(),
            origin: origin.map(Path::to_path_buf),
        };
        groups.push(group.clone());
        Ok(group)
    }

    fn rename_group(&self, id: &str, new_name: &str) -> Result<()> {
        let mut groups = self.lock();
        let Some(group) = groups.iter_mut().find(|group| group.id == id) else {
            bail!("group not found: {id}");
        };
        group.name = new_name.trim().to_string();
        Ok(())
    }

    fn delete_group(&self, id: &str) -> Result<()> {
        let mut groups = self.lock();
        let before = groups.len();
        groups.retain(|group| group.id != id);
        if groups.len() == before {
            bail!("group not found: {id}");
        }
        Ok(())
    }

    fn members(&self, id: &str) -> Result<Vec<PathBuf>> {
        let groups = self.lock();
        let Some(group) = groups.iter().find(|group| group.id == id) else {
            bail!("group not found: {id}");
        };
        Ok(group.members.clone())
    }

    fn set_members(&self, id: &str, members: &[PathBuf]) -> Result<()> {
        let mut groups = self.lock();
        let Some(group) = groups.iter_mut().find(|group| group.id == id) else {
            bail!("group not found: {id}");
        };
        group.members = members.to_vec();
        Ok(())
    }
}

/// Workspace source backed by a fixed file list. Exclude patterns are
/// assumed to be already applied to the list.
#[derive(Debug, Clone, Default)]
pub struct FixedWorkspace {
    files: Vec<PathBuf>,
}

impl FixedWorkspace {
    pub fn new(files: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            files: files.into_iter().collect(),
        }
    }
}

impl WorkspaceSource for FixedWorkspace {
    fn list_files(&self, _excludes: &ExcludeSet) -> Result<Vec<PathBuf>> {
        Ok(self.files.clone())
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.iter().any(|file| file == path)
    }
}
