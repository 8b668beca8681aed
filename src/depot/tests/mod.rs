use super::test_helpers::{TestDepot, create_test_depot};
use super::*;
use crate::error::ConflictError;
use crate::types::{
    CreatedResource, ExportId, ExporterId, ExporterInfo, ExporterUpdate, NewExporter, NewRemote,
    NewRepository, TaskState,
};

mod exports;
mod repositories;

/// Create an exporter over `repositories` writing to `<export root>/<name>`
async fn exporter(td: &TestDepot, name: &str, repositories: &[&str]) -> ExporterId {
    td.depot
        .create_exporter(NewExporter {
            name: name.to_string(),
            repositories: repositories.iter().map(|r| r.to_string()).collect(),
            path: td.export_root().join(name),
        })
        .await
        .unwrap()
        .id
}

/// Run one export to completion and return the created export id
async fn export_and_wait(td: &TestDepot, exporter_id: ExporterId) -> ExportId {
    let task = td.depot.export(exporter_id).await.unwrap();
    let task = td.wait_for_task(task.id).await;
    assert_eq!(task.state, TaskState::Succeeded, "export failed: {:?}", task.error);
    match task.created_resources.as_slice() {
        [CreatedResource::Export { export_id, .. }] => *export_id,
        other => panic!("unexpected resources {:?}", other),
    }
}
