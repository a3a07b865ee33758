//! Workspace file grouping engine.
//!
//! Indexes flat lists of absolute file paths into directory/file trees and
//! layers a session-scoped multi-selection workflow on top, computing add
//! and remove deltas against persisted group membership. Rendering,
//! prompting and command wiring stay with the embedding host: it consumes
//! [`RenderItem`] lists from [`GroupEngine::children`] and reacts to
//! [`ChangeSignal`]s, either by driving the engine directly or through the
//! [`worker`] task loop.

pub mod cache;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod excludes;
pub mod filter;
pub mod resolve;
pub mod session;
pub mod store;
pub mod tree;
pub mod worker;

pub use config::EngineConfig;
pub use domain::{
    ChangeSignal, ConfirmOutcome, Group, ItemKey, RenderItem, SelectionDelta, SessionAction,
    SessionMode, ViewScope,
};
pub use engine::GroupEngine;
pub use error::{EngineError, Result};
pub use session::SelectionSession;
pub use store::{
    FixedWorkspace, FsWorkspaceSource, GroupStore, JsonGroupStore, MemoryGroupStore,
    WorkspaceSource,
};
pub use worker::{EngineEvent, EngineTask, worker_loop};
