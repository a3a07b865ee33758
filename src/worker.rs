use crate::domain::{ConfirmOutcome, Group, RenderItem};
use crate::engine::GroupEngine;
use crate::error::EngineError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands a host sends to the engine worker.
#[derive(Debug, Clone)]
pub enum EngineTask {
    Refresh,
    ListChildren { parent: Option<RenderItem> },
    CreateGroup { name: String },
    RenameGroup { id: String, name: String },
    DeleteGroup { id: String },
    EnterAddSession { group_id: String },
    EnterRemoveSession { group_id: String },
    Toggle { path: String },
    SelectAll,
    DeselectAll,
    SelectInDirectory { dir: String },
    DeselectInDirectory { dir: String },
    SetSearch { query: String },
    ConfirmSession { acknowledge_remove_all: bool },
    CancelSession,
}

/// One event per task, in task order.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Refreshed {
        groups: Vec<Group>,
    },
    Children {
        parent: Option<RenderItem>,
        items: Vec<RenderItem>,
    },
    GroupCreated {
        group: Group,
    },
    SessionChanged,
    SelectionChanged {
        selected: usize,
    },
    SearchChanged {
        query: String,
    },
    Confirmed {
        outcome: ConfirmOutcome,
    },
    Error {
        context: String,
        message: String,
    },
}

/// Drives one engine strictly sequentially: each task runs to completion
/// before the next is picked up, so there is never an overlapping
/// confirm/cancel pair and selection mutations cannot interleave. The loop
/// ends when the host drops either channel end.
pub async fn worker_loop(
    mut engine: GroupEngine,
    mut task_rx: UnboundedReceiver<EngineTask>,
    event_tx: UnboundedSender<EngineEvent>,
) {
    while let Some(task) = task_rx.recv().await {
        let event = run_task(&mut engine, task);
        if event_tx.send(event).is_err() {
            break;
        }
    }
}

fn run_task(engine: &mut GroupEngine, task: EngineTask) -> EngineEvent {
    match task {
        EngineTask::Refresh => match engine.refresh() {
            Ok(()) => EngineEvent::Refreshed {
                groups: engine.groups().to_vec(),
            },
            Err(err) => error_event("refresh", &err),
        },
        EngineTask::ListChildren { parent } => match engine.children(parent.as_ref()) {
            Ok(items) => EngineEvent::Children { parent, items },
            Err(err) => error_event("list", &err),
        },
        EngineTask::CreateGroup { name } => match engine.create_group(&name) {
            Ok(group) => EngineEvent::GroupCreated { group },
            Err(err) => error_event("create-group", &err),
        },
        EngineTask::RenameGroup { id, name } => match engine.rename_group(&id, &name) {
            Ok(()) => EngineEvent::Refreshed {
                groups: engine.groups().to_vec(),
            },
            Err(err) => error_event("rename-group", &err),
        },
        EngineTask::DeleteGroup { id } => match engine.delete_group(&id) {
            Ok(()) => EngineEvent::Refreshed {
                groups: engine.groups().to_vec(),
            },
            Err(err) => error_event("delete-group", &err),
        },
        EngineTask::EnterAddSession { group_id } => match engine.enter_add_session(&group_id) {
            Ok(()) => EngineEvent::SessionChanged,
            Err(err) => error_event("enter-add", &err),
        },
        EngineTask::EnterRemoveSession { group_id } => {
            match engine.enter_remove_session(&group_id) {
                Ok(()) => EngineEvent::SessionChanged,
                Err(err) => error_event("enter-remove", &err),
            }
        }
        EngineTask::Toggle { path } => match engine.toggle(&path) {
            Ok(_) => selection_event(engine),
            Err(err) => error_event("toggle", &err),
        },
        EngineTask::SelectAll => match engine.select_all() {
            Ok(_) => selection_event(engine),
            Err(err) => error_event("select-all", &err),
        },
        EngineTask::DeselectAll => match engine.deselect_all() {
            Ok(_) => selection_event(engine),
            Err(err) => error_event("deselect-all", &err),
        },
        EngineTask::SelectInDirectory { dir } => match engine.select_in_directory(&dir) {
            Ok(_) => selection_event(engine),
            Err(err) => error_event("select-dir", &err),
        },
        EngineTask::DeselectInDirectory { dir } => match engine.deselect_in_directory(&dir) {
            Ok(_) => selection_event(engine),
            Err(err) => error_event("deselect-dir", &err),
        },
        EngineTask::SetSearch { query } => {
            engine.set_search(query.clone());
            EngineEvent::SearchChanged { query }
        }
        EngineTask::ConfirmSession {
            acknowledge_remove_all,
        } => match engine.confirm_session(acknowledge_remove_all) {
            Ok(outcome) => EngineEvent::Confirmed { outcome },
            Err(err) => error_event("confirm", &err),
        },
        EngineTask::CancelSession => {
            engine.cancel_session();
            EngineEvent::SessionChanged
        }
    }
}

fn selection_event(engine: &GroupEngine) -> EngineEvent {
    EngineEvent::SelectionChanged {
        selected: engine.session().selected_count(),
    }
}

fn error_event(context: &str, err: &EngineError) -> EngineEvent {
    EngineEvent::Error {
        context: context.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::store::{FixedWorkspace, MemoryGroupStore};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn ws(path: &str) -> PathBuf {
        PathBuf::from(format!("/ws/{path}"))
    }

    fn engine() -> GroupEngine {
        let store = MemoryGroupStore::with_groups([Group {
            id: "g1".to_string(),
            name: "Current work".to_string(),
            members: vec![ws("a/b.txt")],
            origin: None,
        }]);
        let workspace = FixedWorkspace::new([ws("a/b.txt"), ws("new.txt")]);
        GroupEngine::new(
            &EngineConfig::default(),
            "/ws",
            Arc::new(store),
            Arc::new(workspace),
        )
    }

    #[tokio::test]
    async fn tasks_produce_one_event_each_in_order() {
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        tokio::spawn(worker_loop(engine(), task_rx, event_tx));

        task_tx.send(EngineTask::Refresh).expect("send");
        task_tx
            .send(EngineTask::EnterAddSession {
                group_id: "g1".to_string(),
            })
            .expect("send");
        task_tx
            .send(EngineTask::Toggle {
                path: "new.txt".to_string(),
            })
            .expect("send");
        task_tx
            .send(EngineTask::ConfirmSession {
                acknowledge_remove_all: false,
            })
            .expect("send");

        let refreshed = event_rx.recv().await.expect("refreshed");
        assert!(matches!(
            refreshed,
            EngineEvent::Refreshed { ref groups } if groups.len() == 1
        ));

        assert!(matches!(
            event_rx.recv().await.expect("session"),
            EngineEvent::SessionChanged
        ));

        let selection = event_rx.recv().await.expect("selection");
        assert!(matches!(
            selection,
            EngineEvent::SelectionChanged { selected: 2 }
        ));

        let confirmed = event_rx.recv().await.expect("confirmed");
        match confirmed {
            EngineEvent::Confirmed { outcome } => {
                assert_eq!(outcome.added, vec![ws("new.txt")]);
                assert!(outcome.removed.is_empty());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failing_tasks_surface_error_events_with_context() {
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        tokio::spawn(worker_loop(engine(), task_rx, event_tx));

        task_tx.send(EngineTask::Refresh).expect("send");
        task_tx
            .send(EngineTask::EnterAddSession {
                group_id: "missing".to_string(),
            })
            .expect("send");
        task_tx
            .send(EngineTask::Toggle {
                path: "a/b.txt".to_string(),
            })
            .expect("send");

        event_rx.recv().await.expect("refreshed");

        let enter = event_rx.recv().await.expect("enter error");
        assert!(matches!(
            enter,
            EngineEvent::Error { ref context, ref message }
                if context == "enter-add" && message.contains("missing")
        ));

        // No session was entered, so the toggle fails too.
        let toggle = event_rx.recv().await.expect("toggle error");
        assert!(matches!(
            toggle,
            EngineEvent::Error { ref context, .. } if context == "toggle"
        ));
    }
}
