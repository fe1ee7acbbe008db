//! Debounce coordinator behavior under paused tokio time: coalescing,
//! failure visibility and forced reload.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use fat_protocols::editor::{AutosaveCoordinator, ProtocolSink, SaveState};
use fat_protocols::error::StoreError;
use fat_protocols::models::protocol::{
    ChecklistItem, ItemAnswer, Protocol, ProtocolStatus, Seccion,
};

#[derive(Default)]
struct SinkInner {
    saves: Mutex<Vec<BTreeMap<String, Protocol>>>,
    stored: Mutex<BTreeMap<String, Protocol>>,
    fail: AtomicBool,
}

#[derive(Clone, Default)]
struct RecordingSink {
    inner: Arc<SinkInner>,
}

impl RecordingSink {
    fn save_count(&self) -> usize {
        self.inner.saves.lock().unwrap().len()
    }

    fn last_save(&self) -> BTreeMap<String, Protocol> {
        self.inner.saves.lock().unwrap().last().cloned().unwrap()
    }

    fn set_fail(&self, fail: bool) {
        self.inner.fail.store(fail, Ordering::SeqCst);
    }

    fn seed_stored(&self, panel_id: &str, protocol: Protocol) {
        self.inner
            .stored
            .lock()
            .unwrap()
            .insert(panel_id.to_string(), protocol);
    }
}

#[async_trait]
impl ProtocolSink for RecordingSink {
    async fn save(
        &self,
        _project_id: &str,
        protocols: &BTreeMap<String, Protocol>,
    ) -> Result<(), StoreError> {
        if self.inner.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Forbidden);
        }
        self.inner.saves.lock().unwrap().push(protocols.clone());
        *self.inner.stored.lock().unwrap() = protocols.clone();
        Ok(())
    }

    async fn load(&self, _project_id: &str) -> Result<BTreeMap<String, Protocol>, StoreError> {
        Ok(self.inner.stored.lock().unwrap().clone())
    }
}

const DELAY: Duration = Duration::from_secs(2);

#[tokio::test(start_paused = true)]
async fn rapid_mutations_coalesce_into_one_write() {
    let sink = RecordingSink::default();
    let coordinator = AutosaveCoordinator::new("proj-1", sink.clone(), DELAY);

    for code in ["est-01", "est-02", "est-03", "est-04", "est-05"] {
        coordinator.mutate(|editor| {
            editor.toggle_item("panel-1", Seccion::Estructura, code, ItemAnswer::Si);
        });
    }
    assert_eq!(coordinator.save_state(), SaveState::Dirty);
    assert!(coordinator.has_pending_changes());
    assert_eq!(sink.save_count(), 0, "nothing flushes inside the window");

    tokio::time::sleep(DELAY + Duration::from_secs(1)).await;

    assert_eq!(sink.save_count(), 1, "five edits, one write");
    let saved = &sink.last_save()["panel-1"];
    for code in ["est-01", "est-02", "est-03", "est-04", "est-05"] {
        assert_eq!(saved.estructura[code].estado, ItemAnswer::Si);
    }
    assert_eq!(coordinator.save_state(), SaveState::Idle);
    assert!(!coordinator.has_pending_changes());
}

#[tokio::test(start_paused = true)]
async fn each_batch_gets_its_own_write() {
    let sink = RecordingSink::default();
    let coordinator = AutosaveCoordinator::new("proj-1", sink.clone(), DELAY);

    coordinator.mutate(|editor| {
        editor.toggle_item("panel-1", Seccion::Pruebas, "pr-01", ItemAnswer::Si);
    });
    tokio::time::sleep(DELAY + Duration::from_secs(1)).await;
    assert_eq!(sink.save_count(), 1);

    coordinator.mutate(|editor| {
        editor.toggle_item("panel-1", Seccion::Pruebas, "pr-02", ItemAnswer::Na);
    });
    tokio::time::sleep(DELAY + Duration::from_secs(1)).await;
    assert_eq!(sink.save_count(), 2);
    assert_eq!(
        sink.last_save()["panel-1"].pruebas["pr-02"].estado,
        ItemAnswer::Na
    );
}

#[tokio::test(start_paused = true)]
async fn mutation_resets_the_trailing_edge() {
    let sink = RecordingSink::default();
    let coordinator = AutosaveCoordinator::new("proj-1", sink.clone(), DELAY);

    coordinator.mutate(|editor| {
        editor.toggle_item("panel-1", Seccion::Estructura, "est-01", ItemAnswer::Si);
    });
    // Halfway through the window, edit again: the timer restarts.
    tokio::time::sleep(Duration::from_secs(1)).await;
    coordinator.mutate(|editor| {
        editor.toggle_item("panel-1", Seccion::Estructura, "est-02", ItemAnswer::Si);
    });
    // 1.5 s after the second edit: still inside the new window.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(sink.save_count(), 0);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(sink.save_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_write_is_a_visible_conflict() {
    let sink = RecordingSink::default();
    let coordinator = AutosaveCoordinator::new("proj-1", sink.clone(), DELAY);

    sink.set_fail(true);
    coordinator.mutate(|editor| {
        editor.toggle_item("panel-1", Seccion::ControlFinal, "cf-01", ItemAnswer::Si);
    });
    tokio::time::sleep(DELAY + Duration::from_secs(1)).await;

    assert_eq!(sink.save_count(), 0);
    assert_eq!(coordinator.save_state(), SaveState::Conflict);
    assert!(
        coordinator.has_pending_changes(),
        "a failed write must not clear the unsaved signal"
    );
    assert!(coordinator.last_error().is_some());

    // Editing again reschedules and recovers once the sink heals.
    sink.set_fail(false);
    coordinator.mutate(|editor| {
        editor.toggle_item("panel-1", Seccion::ControlFinal, "cf-02", ItemAnswer::Si);
    });
    tokio::time::sleep(DELAY + Duration::from_secs(1)).await;

    assert_eq!(sink.save_count(), 1);
    assert_eq!(coordinator.save_state(), SaveState::Idle);
    assert!(!coordinator.has_pending_changes());
    assert!(coordinator.last_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn confirmed_version_advances_on_success_only() {
    let sink = RecordingSink::default();
    let coordinator = AutosaveCoordinator::new("proj-1", sink.clone(), DELAY);
    assert_eq!(coordinator.confirmed_version(), 0);

    sink.set_fail(true);
    coordinator.mutate(|editor| {
        editor.open_panel("panel-1");
    });
    tokio::time::sleep(DELAY + Duration::from_secs(1)).await;
    assert_eq!(coordinator.confirmed_version(), 0);

    sink.set_fail(false);
    coordinator.mutate(|editor| {
        editor.open_panel("panel-2");
    });
    tokio::time::sleep(DELAY + Duration::from_secs(1)).await;
    assert_eq!(coordinator.confirmed_version(), 2);
}

#[tokio::test(start_paused = true)]
async fn force_reload_normalizes_and_discards_pending_edits() {
    let sink = RecordingSink::default();

    // The store holds a partial protocol with a smuggled status.
    let mut partial = Protocol::default();
    partial.estructura.insert(
        "est-01".into(),
        ChecklistItem {
            estado: ItemAnswer::Si,
            observacion: String::new(),
        },
    );
    partial.estado = ProtocolStatus::Aprobado;
    sink.seed_stored("panel-9", partial);

    let coordinator = AutosaveCoordinator::new("proj-1", sink.clone(), DELAY);
    coordinator.mutate(|editor| {
        editor.open_panel("panel-local");
    });

    coordinator.force_reload().await.expect("reload");

    let panel = coordinator.snapshot("panel-9").expect("fetched panel");
    assert_eq!(panel.estructura["est-01"].estado, ItemAnswer::Si);
    assert_eq!(panel.pruebas.len(), 5, "missing sections are back-filled");
    assert_eq!(panel.estado, ProtocolStatus::Pendiente, "status recomputed");

    // Local-only state and the armed timer are gone.
    assert!(coordinator.snapshot("panel-local").is_none());
    assert!(!coordinator.has_pending_changes());
    assert_eq!(coordinator.save_state(), SaveState::Idle);

    tokio::time::sleep(DELAY + Duration::from_secs(1)).await;
    assert_eq!(sink.save_count(), 0, "reload cancels the scheduled write");
}
