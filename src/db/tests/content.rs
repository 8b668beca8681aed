use super::{open_db, seed_repository, unit};

#[tokio::test]
async fn test_create_version_links_content() {
    let (db, _file) = open_db().await;
    seed_repository(&db, "base").await;

    let units = vec![unit("a.txt", "aa", 1), unit("b/c.txt", "bb", 2)];
    let number = db
        .create_repository_version("base", 0, None, &units)
        .await
        .unwrap();
    assert_eq!(number, 1);

    assert_eq!(db.version_content("base", 1).await.unwrap(), units);
    assert!(db.version_content("base", 0).await.unwrap().is_empty());
    assert_eq!(
        db.get_repository("base").await.unwrap().unwrap().latest_version,
        1
    );

    let versions = db.list_repository_versions("base").await.unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[1].unit_count, 2);

    db.close().await;
}

#[tokio::test]
async fn test_units_are_shared_between_versions() {
    let (db, _file) = open_db().await;
    seed_repository(&db, "base").await;

    db.create_repository_version("base", 0, None, &[unit("a.txt", "aa", 1)])
        .await
        .unwrap();
    db.create_repository_version(
        "base",
        1,
        None,
        &[unit("a.txt", "aa", 1), unit("b.txt", "bb", 1)],
    )
    .await
    .unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content_units")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 2);

    db.close().await;
}

#[tokio::test]
async fn test_stale_base_version_is_rejected() {
    let (db, _file) = open_db().await;
    seed_repository(&db, "base").await;

    db.create_repository_version("base", 0, None, &[unit("a.txt", "aa", 1)])
        .await
        .unwrap();

    // Built on version 0, but the repository has moved on
    let result = db
        .create_repository_version("base", 0, None, &[unit("z.txt", "zz", 1)])
        .await;
    assert!(result.is_err());

    // Nothing from the failed attempt is visible
    assert_eq!(db.list_repository_versions("base").await.unwrap().len(), 2);
    assert_eq!(db.version_content("base", 1).await.unwrap().len(), 1);

    db.close().await;
}
