use super::*;

#[tokio::test]
async fn create_repository_is_idempotent() {
    let td = create_test_depot().await;

    let first = td
        .depot
        .create_repository(NewRepository::named("zoo").with_remote(NewRemote {
            url: "https://feeds.example/zoo/manifest.csv".to_string(),
            ca_cert: None,
            client_cert: None,
        }))
        .await
        .unwrap();
    let second = td
        .depot
        .create_repository(NewRepository::named("zoo"))
        .await
        .unwrap();

    assert_eq!(first.name, second.name);
    assert_eq!(second.remotes.len(), 1);
    assert_eq!(first.created_at, second.created_at);
    assert_eq!(td.depot.list_repositories().await.unwrap().len(), 1);
}

#[tokio::test]
async fn repository_name_is_validated() {
    let td = create_test_depot().await;

    for name in ["", "has space", "slash/name"] {
        let err = td
            .depot
            .create_repository(NewRepository::named(name))
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::Validation { ref field, .. } if field.as_deref() == Some("name")),
            "{:?} accepted: {:?}",
            name,
            err
        );
    }
}

#[tokio::test]
async fn remote_must_be_http() {
    let td = create_test_depot().await;

    let err = td
        .depot
        .create_repository(NewRepository::named("zoo").with_remote(NewRemote {
            url: "ftp://feeds.example/zoo/manifest.csv".to_string(),
            ca_cert: None,
            client_cert: None,
        }))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation { .. }));
    assert!(matches!(
        td.depot.get_repository("zoo").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn sync_creates_a_version() {
    let td = create_test_depot().await;
    td.repository_with("zoo", &[("lion.txt", "roar"), ("owl.txt", "hoot")])
        .await;

    let task = td.sync_and_wait("zoo").await;

    assert_eq!(task.state, TaskState::Succeeded);
    assert_eq!(
        task.created_resources,
        vec![CreatedResource::RepositoryVersion {
            repository: "zoo".to_string(),
            number: 1,
        }]
    );
    let versions = td.depot.list_repository_versions("zoo").await.unwrap();
    assert_eq!(versions.last().unwrap().number, 1);
    assert_eq!(versions.last().unwrap().unit_count, 2);
    assert_eq!(versions.last().unwrap().task_id, Some(task.id));
    assert_eq!(td.depot.get_repository("zoo").await.unwrap().latest_version, 1);
}

#[tokio::test]
async fn unchanged_feed_creates_no_version() {
    let td = create_test_depot().await;
    td.repository_with("zoo", &[("lion.txt", "roar")]).await;

    td.sync_and_wait("zoo").await;
    let again = td.sync_and_wait("zoo").await;

    assert_eq!(again.state, TaskState::Succeeded);
    assert!(again.created_resources.is_empty());
    assert_eq!(td.depot.get_repository("zoo").await.unwrap().latest_version, 1);
}

#[tokio::test]
async fn sync_of_unknown_repository_is_not_scheduled() {
    let td = create_test_depot().await;

    assert!(td.depot.sync("missing").await.unwrap().is_none());
    assert!(td.depot.list_tasks(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn sync_without_remotes_is_not_scheduled() {
    let td = create_test_depot().await;
    td.depot
        .create_repository(NewRepository::named("bare"))
        .await
        .unwrap();

    assert!(td.depot.sync("bare").await.unwrap().is_none());
}

#[tokio::test]
async fn second_sync_is_rejected_while_first_is_active() {
    let td = create_test_depot().await;
    td.repository_with("zoo", &[("lion.txt", "roar")]).await;

    let first = td.depot.sync("zoo").await.unwrap().unwrap();
    let second = td.depot.sync("zoo").await.unwrap();

    assert!(second.is_none());
    td.wait_for_task(first.id).await;

    // Once the first sync is terminal a new one is accepted
    assert!(td.depot.sync("zoo").await.unwrap().is_some());
}

#[tokio::test]
async fn failed_fetch_fails_the_task() {
    let td = create_test_depot().await;
    td.depot
        .create_repository(NewRepository::named("ghost").with_remote(NewRemote {
            url: "https://feeds.example/ghost/manifest.csv".to_string(),
            ca_cert: None,
            client_cert: None,
        }))
        .await
        .unwrap();

    let task = td.sync_and_wait("ghost").await;

    assert_eq!(task.state, TaskState::Failed);
    let error = task.error.unwrap();
    assert_eq!(error.code, "feed_error");
    assert!(task.created_resources.is_empty());
    assert_eq!(td.depot.get_repository("ghost").await.unwrap().latest_version, 0);
}

#[tokio::test]
async fn versions_of_unknown_repository_not_found() {
    let td = create_test_depot().await;
    assert!(matches!(
        td.depot.list_repository_versions("nope").await,
        Err(Error::NotFound(_))
    ));
}
