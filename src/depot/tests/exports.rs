use super::*;
use crate::error::ToHttpStatus;
use crate::export::{ExportMetadata, METADATA_ENTRY, file_sha256};
use crate::types::{Event, ExportedResource};
use std::io::Read;

fn read_entry(path: &std::path::Path, name: &str) -> Vec<u8> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).unwrap();
    bytes
}

#[tokio::test]
async fn export_of_unknown_exporter_not_found() {
    let td = create_test_depot().await;
    assert!(matches!(
        td.depot.export(ExporterId(7)).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn export_returns_waiting_task() {
    let td = create_test_depot().await;
    td.repository_with("lion", &[("a.txt", "a")]).await;
    let id = exporter(&td, "cats", &["lion"]).await;

    let task = td.depot.export(id).await.unwrap();

    assert_eq!(task.state, TaskState::Waiting);
    assert_eq!(task.resource_key.as_str(), format!("exporter:{}", id));
    td.wait_for_task(task.id).await;
}

#[tokio::test]
async fn three_repositories_exported_at_latest_versions() {
    let td = create_test_depot().await;
    td.repository_with("lion", &[("mane.txt", "golden")]).await;
    td.repository_with("tiger", &[("stripes.txt", "black")]).await;
    td.repository_with("cheetah", &[("spots.txt", "fast")]).await;

    let mut sync_ids = Vec::new();
    for name in ["lion", "tiger", "cheetah"] {
        sync_ids.push(td.depot.sync(name).await.unwrap().unwrap().id);
    }
    let options = crate::monitor::PollOptions {
        interval: std::time::Duration::from_millis(10),
        timeout: Some(std::time::Duration::from_secs(10)),
    };
    let outcomes = crate::monitor::await_all(&td.depot, &sync_ids, &options).await;
    assert!(outcomes.iter().all(|o| o.is_finished()));

    // A second sync of tiger moves it to version 2 before the export
    td.feed.publish(
        &super::super::test_helpers::feed_url("tiger"),
        &[("stripes.txt", "black"), ("tail.txt", "long")],
    );
    td.sync_and_wait("tiger").await;

    let id = exporter(&td, "cats", &["lion", "tiger", "cheetah"]).await;
    let export_id = export_and_wait(&td, id).await;
    let export = td.depot.get_export(id, export_id).await.unwrap();

    assert_eq!(
        export.exported_resources,
        vec![
            ExportedResource {
                repository: "lion".to_string(),
                version: 1
            },
            ExportedResource {
                repository: "tiger".to_string(),
                version: 2
            },
            ExportedResource {
                repository: "cheetah".to_string(),
                version: 1
            },
        ]
    );
    assert!(export.filename.starts_with(td.export_root().join("cats")));
    assert_eq!(file_sha256(&export.filename).unwrap(), export.sha256);

    let metadata: ExportMetadata =
        serde_json::from_slice(&read_entry(&export.filename, METADATA_ENTRY)).unwrap();
    assert_eq!(metadata.exporter, "cats");
    assert_eq!(metadata.repositories.len(), 3);
    assert_eq!(
        read_entry(&export.filename, "repositories/tiger/tail.txt"),
        b"long"
    );
    assert_eq!(
        read_entry(&export.filename, "repositories/lion/mane.txt"),
        b"golden"
    );
}

#[tokio::test]
async fn every_export_is_listed_and_last_one_is_tracked() {
    let td = create_test_depot().await;
    td.repository_with("lion", &[("a.txt", "a")]).await;
    td.sync_and_wait("lion").await;
    let id = exporter(&td, "cats", &["lion"]).await;

    let mut created = Vec::new();
    for _ in 0..3 {
        created.push(export_and_wait(&td, id).await);
    }

    let listed: Vec<ExportId> = td
        .depot
        .list_exports(id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(listed, created);
    assert_eq!(
        td.depot.get_exporter(id).await.unwrap().last_export,
        created.last().copied()
    );
}

#[tokio::test]
async fn concurrent_exports_of_one_exporter_run_in_order() {
    let td = create_test_depot().await;
    td.repository_with("lion", &[("a.txt", "a")]).await;
    td.sync_and_wait("lion").await;
    let id = exporter(&td, "cats", &["lion"]).await;
    let mut events = td.depot.subscribe();

    let mut task_ids = Vec::new();
    for _ in 0..4 {
        task_ids.push(td.depot.export(id).await.unwrap().id);
    }
    for task_id in &task_ids {
        assert_eq!(td.wait_for_task(*task_id).await.state, TaskState::Succeeded);
    }

    // Each export starts only after the previous one has finished
    let mut transitions = Vec::new();
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while transitions.len() < task_ids.len() * 2 {
            match events.recv().await.unwrap() {
                Event::TaskStateChanged { id, state, .. } if state != TaskState::Waiting => {
                    transitions.push((id, state))
                }
                _ => {}
            }
        }
    })
    .await
    .unwrap();
    let expected: Vec<_> = task_ids
        .iter()
        .flat_map(|id| [(*id, TaskState::Running), (*id, TaskState::Succeeded)])
        .collect();
    assert_eq!(transitions, expected);

    let exports = td.depot.list_exports(id).await.unwrap();
    assert_eq!(exports.len(), 4);
    let export_tasks: Vec<_> = exports.iter().map(|e| e.task_id.unwrap()).collect();
    assert_eq!(export_tasks, task_ids);
    assert_eq!(
        td.depot.get_exporter(id).await.unwrap().last_export,
        Some(exports[3].id)
    );
}

#[tokio::test]
async fn deleting_an_older_export_removes_it() {
    let td = create_test_depot().await;
    td.repository_with("lion", &[("a.txt", "a")]).await;
    td.sync_and_wait("lion").await;
    let id = exporter(&td, "cats", &["lion"]).await;
    let first = export_and_wait(&td, id).await;
    let second = export_and_wait(&td, id).await;
    let first_file = td.depot.get_export(id, first).await.unwrap().filename;
    let mut events = td.depot.subscribe();

    td.depot.delete_export(id, first).await.unwrap();

    assert!(matches!(
        td.depot.get_export(id, first).await,
        Err(Error::NotFound(_))
    ));
    assert!(!first_file.exists());
    assert_eq!(td.depot.list_exports(id).await.unwrap().len(), 1);
    assert_eq!(td.depot.get_exporter(id).await.unwrap().last_export, Some(second));
    let deleted = tokio::time::timeout(std::time::Duration::from_secs(1), async {
        loop {
            if let Event::ExportDeleted { export_id, .. } = events.recv().await.unwrap() {
                return export_id;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(deleted, first);
}

#[tokio::test]
async fn deleting_last_export_is_a_conflict() {
    let td = create_test_depot().await;
    td.repository_with("lion", &[("a.txt", "a")]).await;
    td.sync_and_wait("lion").await;
    let id = exporter(&td, "cats", &["lion"]).await;
    let export_id = export_and_wait(&td, id).await;

    let err = td.depot.delete_export(id, export_id).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Conflict(ConflictError::LastExportProtected { .. })
    ));
    assert_eq!(err.status_code(), 500);
    let still_there = td.depot.get_export(id, export_id).await.unwrap();
    assert!(still_there.filename.exists());
}

#[tokio::test]
async fn export_of_another_exporter_is_not_found() {
    let td = create_test_depot().await;
    td.repository_with("lion", &[("a.txt", "a")]).await;
    td.sync_and_wait("lion").await;
    let cats = exporter(&td, "cats", &["lion"]).await;
    let dogs = exporter(&td, "dogs", &["lion"]).await;
    let export_id = export_and_wait(&td, cats).await;

    assert!(matches!(
        td.depot.get_export(dogs, export_id).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        td.depot.delete_export(dogs, export_id).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn three_exports_then_delete_oldest_and_latest() {
    let td = create_test_depot().await;
    for (name, file) in [("lion", "mane.txt"), ("tiger", "stripes.txt"), ("cheetah", "spots.txt")] {
        td.repository_with(name, &[(file, name)]).await;
        td.sync_and_wait(name).await;
    }
    let id = exporter(&td, "cats", &["lion", "tiger", "cheetah"]).await;

    let mut created = Vec::new();
    for _ in 0..3 {
        created.push(export_and_wait(&td, id).await);
    }
    let listed: Vec<ExportId> = td
        .depot
        .list_exports(id)
        .await
        .unwrap()
        .iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(listed, created);

    td.depot.delete_export(id, created[0]).await.unwrap();
    assert_eq!(td.depot.list_exports(id).await.unwrap().len(), 2);

    let err = td.depot.delete_export(id, created[2]).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(err.error_code(), "conflict");
    assert!(td.depot.get_export(id, created[2]).await.is_ok());
}
