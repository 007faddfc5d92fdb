//! Integration tests for the drive worker
//!
//! These tests verify the request queue end to end:
//! - Replies go to the caller that submitted the request
//! - Requests start in submission order with a single worker
//! - Handler errors and panics do not stop the worker
//! - Timeouts and cancellation, including requests abandoned in the queue
//!   and callers still waiting for a queue slot
//! - Journal creation from the cached template

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    storage::{
        DocumentStore, ListFilesParams, ListFilesResult, NewDocument, RemoteDocument, RemoteItem,
    },
};
use chrono::{TimeZone, Utc};
use core_journal::{CallOptions, ConfigInfoCache, DriveWorker, JournalError, TemplateVars};
use core_runtime::config::{DriveSettings, WorkerConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Fake Document Store
// ============================================================================

/// In-memory store that records every call
///
/// Special file IDs:
/// - `block` waits until [`FakeStore::release`] is called
/// - `panic` panics inside the handler
/// - `missing` fails with `NotFound`
#[derive(Default)]
struct FakeStore {
    calls: Mutex<Vec<String>>,
    created: Mutex<Vec<NewDocument>>,
    grants: Mutex<Vec<(String, String, String)>>,
    template_reads: Mutex<usize>,
    gate: Notify,
}

impl FakeStore {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn release(&self) {
        self.gate.notify_one();
    }

    async fn wait_for_call(&self, id: &str) {
        for _ in 0..200 {
            if self.calls().iter().any(|call| call == id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("store never received {id}");
    }
}

fn item(id: &str, name: &str) -> RemoteItem {
    RemoteItem {
        id: id.to_string(),
        name: name.to_string(),
        ..RemoteItem::default()
    }
}

#[async_trait]
impl DocumentStore for FakeStore {
    async fn get_file(&self, id: &str) -> BridgeResult<RemoteItem> {
        if id == "panic" {
            panic!("handler blew up");
        }
        self.calls.lock().unwrap().push(id.to_string());

        match id {
            "block" => {
                self.gate.notified().await;
                Ok(item(id, "blocked"))
            }
            "missing" => Err(BridgeError::NotFound(id.to_string())),
            _ => Ok(item(id, &format!("{id} name"))),
        }
    }

    async fn list_files(&self, params: ListFilesParams) -> BridgeResult<ListFilesResult> {
        Ok(ListFilesResult {
            folder: item(&params.parent, "folder"),
            files: Vec::new(),
            next_page_token: None,
        })
    }

    async fn read_document(&self, id: &str) -> BridgeResult<RemoteDocument> {
        *self.template_reads.lock().unwrap() += 1;
        Ok(RemoteDocument {
            item: item(id, "YYYY-MM-DD Species - Name"),
            content: "Admitted YYYY-MM-DD\nName (Species)\nBinoURL".to_string(),
        })
    }

    async fn create_document(&self, document: NewDocument) -> BridgeResult<RemoteItem> {
        let created = item("new-journal", &document.name);
        self.created.lock().unwrap().push(document);
        Ok(created)
    }

    async fn grant_permission(&self, file_id: &str, email: &str, role: &str) -> BridgeResult<()> {
        self.grants
            .lock()
            .unwrap()
            .push((file_id.to_string(), email.to_string(), role.to_string()));
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn drive_settings() -> DriveSettings {
    DriveSettings {
        journal_folder: "journals".to_string(),
        template_file: "template".to_string(),
        ..DriveSettings::default()
    }
}

fn start_worker(store: Arc<FakeStore>, capacity: usize) -> Arc<DriveWorker> {
    let config = WorkerConfig {
        queue_capacity: capacity,
        ..WorkerConfig::default()
    };
    let cache = Arc::new(ConfigInfoCache::new(&drive_settings()));
    DriveWorker::start(&config, store, cache, CancellationToken::new())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_get_file_returns_item() {
    let store = Arc::new(FakeStore::default());
    let worker = start_worker(Arc::clone(&store), 10);

    let file = worker.get_file("abc", &CallOptions::default()).await.unwrap();

    assert_eq!(file.id, "abc");
    assert_eq!(file.name, "abc name");
    assert_eq!(store.calls(), vec!["abc"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_get_their_own_reply() {
    let store = Arc::new(FakeStore::default());
    let worker = start_worker(Arc::clone(&store), 4);

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move {
                let id = format!("file-{i}");
                let file = worker.get_file(id.clone(), &CallOptions::default()).await?;
                Ok::<_, JournalError>((id, file))
            })
        })
        .collect();

    for handle in handles {
        let (requested, file) = handle.await.unwrap().unwrap();
        assert_eq!(file.id, requested);
    }
    assert_eq!(store.calls().len(), 32);
}

#[tokio::test]
async fn test_requests_start_in_submission_order() {
    let store = Arc::new(FakeStore::default());
    let worker = start_worker(Arc::clone(&store), 100);
    let opts = CallOptions::default();

    let ids: Vec<String> = (0..10).map(|i| format!("f{i}")).collect();
    let results =
        futures::future::join_all(ids.iter().map(|id| worker.get_file(id.clone(), &opts))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(store.calls(), ids);
}

#[tokio::test]
async fn test_worker_survives_errors_and_panics() {
    let store = Arc::new(FakeStore::default());
    let worker = start_worker(Arc::clone(&store), 10);
    let opts = CallOptions::default();

    let err = worker.get_file("missing", &opts).await.unwrap_err();
    assert!(matches!(err, JournalError::Remote(BridgeError::NotFound(_))));

    let err = worker.get_file("panic", &opts).await.unwrap_err();
    assert!(matches!(err, JournalError::HandlerPanicked));

    let file = worker.get_file("after", &opts).await.unwrap();
    assert_eq!(file.id, "after");
}

#[tokio::test]
async fn test_timeout_while_handling() {
    let store = Arc::new(FakeStore::default());
    let worker = start_worker(Arc::clone(&store), 10);

    let opts = CallOptions::new().with_timeout(Duration::from_millis(50));
    let err = worker.get_file("block", &opts).await.unwrap_err();
    assert!(matches!(err, JournalError::Timeout(limit) if limit == Duration::from_millis(50)));

    store.release();
    let file = worker
        .get_file("next", &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(file.id, "next");
}

#[tokio::test]
async fn test_cancelled_request_is_skipped_by_worker() {
    let store = Arc::new(FakeStore::default());
    let worker = start_worker(Arc::clone(&store), 1);

    let blocked = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.get_file("block", &CallOptions::default()).await })
    };
    store.wait_for_call("block").await;

    let cancel = CancellationToken::new();
    let queued = {
        let worker = Arc::clone(&worker);
        let opts = CallOptions::new().with_cancel(cancel.clone());
        tokio::spawn(async move { worker.get_file("queued", &opts).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    cancel.cancel();
    let err = queued.await.unwrap().unwrap_err();
    assert!(matches!(err, JournalError::Cancelled));

    store.release();
    assert_eq!(blocked.await.unwrap().unwrap().id, "block");

    worker
        .get_file("after", &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(store.calls(), vec!["block", "after"]);
}

#[tokio::test]
async fn test_full_queue_bounds_admission_wait() {
    let store = Arc::new(FakeStore::default());
    let worker = start_worker(Arc::clone(&store), 1);

    let blocked = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.get_file("block", &CallOptions::default()).await })
    };
    store.wait_for_call("block").await;

    let filler = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.get_file("filler", &CallOptions::default()).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // The only slot is taken, so both callers below wait to be admitted.
    let opts = CallOptions::new().with_timeout(Duration::from_millis(50));
    let err = worker.get_file("late", &opts).await.unwrap_err();
    assert!(matches!(err, JournalError::Timeout(limit) if limit == Duration::from_millis(50)));

    let cancel = CancellationToken::new();
    let waiting = {
        let worker = Arc::clone(&worker);
        let opts = CallOptions::new().with_cancel(cancel.clone());
        tokio::spawn(async move { worker.get_file("abandoned", &opts).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
    let err = waiting.await.unwrap().unwrap_err();
    assert!(matches!(err, JournalError::Cancelled));

    store.release();
    assert_eq!(blocked.await.unwrap().unwrap().id, "block");
    assert_eq!(filler.await.unwrap().unwrap().id, "filler");
    assert_eq!(store.calls(), vec!["block", "filler"]);
}

#[tokio::test]
async fn test_create_journal_from_template() {
    let store = Arc::new(FakeStore::default());
    let worker = start_worker(Arc::clone(&store), 10);

    let vars = TemplateVars {
        time: Utc.with_ymd_and_hms(2024, 3, 7, 10, 0, 0).unwrap(),
        name: "Pigg".to_string(),
        species: "Hedgehog".to_string(),
        bino_url: "https://bino.example/patient/42".to_string(),
    };
    let journal = worker
        .create_journal(vars, &CallOptions::default())
        .await
        .unwrap();

    assert_eq!(journal.id, "new-journal");
    assert_eq!(journal.name, "2024-03-07 Hedgehog - Pigg");

    let created = store.created.lock().unwrap().clone();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].template_id, "template");
    assert_eq!(created[0].parent_id, "journals");

    let placeholders: Vec<&str> = created[0]
        .replacements
        .iter()
        .map(|r| r.placeholder.as_str())
        .collect();
    assert_eq!(
        placeholders,
        vec!["YYYY", "MM", "DD", "Name", "Species", "BinoURL"]
    );
}

#[tokio::test]
async fn test_config_info_is_memoized() {
    let store = Arc::new(FakeStore::default());
    let worker = start_worker(Arc::clone(&store), 10);
    let opts = CallOptions::default();

    let first = worker.config_info(&opts).await.unwrap();
    let second = worker.config_info(&opts).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(*store.template_reads.lock().unwrap(), 1);

    worker.invalidate_config_info().await;
    worker.config_info(&opts).await.unwrap();
    assert_eq!(*store.template_reads.lock().unwrap(), 2);
}

#[tokio::test]
async fn test_config_info_waits_behind_queued_calls() {
    let store = Arc::new(FakeStore::default());
    let worker = start_worker(Arc::clone(&store), 10);

    let blocked = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.get_file("block", &CallOptions::default()).await })
    };
    store.wait_for_call("block").await;

    let opts = CallOptions::new().with_timeout(Duration::from_millis(50));
    let err = worker.config_info(&opts).await.unwrap_err();
    assert!(matches!(err, JournalError::Timeout(_)));
    assert_eq!(store.calls(), vec!["block"]);
    assert_eq!(*store.template_reads.lock().unwrap(), 0);

    store.release();
    blocked.await.unwrap().unwrap();

    let info = worker.config_info(&CallOptions::default()).await.unwrap();
    assert_eq!(info.journal_folder.id, "journals");
    assert_eq!(store.calls(), vec!["block", "journals"]);
    assert_eq!(*store.template_reads.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_invite_user() {
    let store = Arc::new(FakeStore::default());
    let worker = start_worker(Arc::clone(&store), 10);

    worker
        .invite_user("folder-1", "vet@example.org", "writer", &CallOptions::default())
        .await
        .unwrap();

    assert_eq!(
        store.grants.lock().unwrap().clone(),
        vec![(
            "folder-1".to_string(),
            "vet@example.org".to_string(),
            "writer".to_string()
        )]
    );
}

#[tokio::test]
async fn test_calls_fail_after_stop() {
    let store = Arc::new(FakeStore::default());
    let worker = start_worker(Arc::clone(&store), 10);

    worker.stop().await;

    let err = worker
        .get_file("late", &CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, JournalError::WorkerStopped));
    assert!(store.calls().is_empty());
}
