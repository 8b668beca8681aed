use super::open_db;

#[tokio::test]
async fn test_shutdown_state_initial() {
    let (db, _file) = open_db().await;

    // No flag recorded yet counts as unclean
    assert!(db.was_unclean_shutdown().await.unwrap());

    db.close().await;
}

#[tokio::test]
async fn test_shutdown_state_clean_lifecycle() {
    let (db, _file) = open_db().await;

    db.set_clean_start().await.unwrap();
    assert!(
        db.was_unclean_shutdown().await.unwrap(),
        "after start, should still indicate unclean (not yet shut down)"
    );

    db.set_clean_shutdown().await.unwrap();
    assert!(!db.was_unclean_shutdown().await.unwrap());

    // Restart flips it back
    db.set_clean_start().await.unwrap();
    assert!(db.was_unclean_shutdown().await.unwrap());

    db.close().await;
}
