//! Integration tests for `VideoRepo` against a migrated in-memory database.

use assert_matches::assert_matches;
use vidshare_core::error::CoreError;
use vidshare_db::models::video::{CreateVideo, VideoFilter};
use vidshare_db::repositories::VideoRepo;
use vidshare_db::{DbError, DbPool};

async fn pool() -> DbPool {
    let pool = vidshare_db::create_in_memory_pool().await.unwrap();
    vidshare_db::run_migrations(&pool).await.unwrap();
    pool
}

fn new_video(filename: &str, owner_id: Option<i64>) -> CreateVideo {
    CreateVideo {
        filename: filename.to_string(),
        original_name: "clip.mp4".to_string(),
        storage_path: format!("uploads/{filename}"),
        duration_secs: 90.0,
        size_bytes: 2048,
        owner_id,
    }
}

#[tokio::test]
async fn test_health_check() {
    let pool = pool().await;
    vidshare_db::health_check(&pool).await.unwrap();
}

#[tokio::test]
async fn test_create_and_find() {
    let pool = pool().await;
    let created = VideoRepo::create(&pool, &new_video("a.mp4", Some(1)))
        .await
        .unwrap();

    assert!(created.id > 0);
    assert_eq!(created.filename, "a.mp4");
    assert_eq!(created.original_name, "clip.mp4");
    assert_eq!(created.storage_path, "uploads/a.mp4");
    assert!((created.duration_secs - 90.0).abs() < f64::EPSILON);
    assert_eq!(created.size_bytes, 2048);
    assert_eq!(created.created_at, created.updated_at);

    let found = VideoRepo::find_by_id(&pool, created.id)
        .await
        .unwrap()
        .expect("row should exist");
    assert_eq!(found.filename, created.filename);
    assert_eq!(found.owner_id, Some(1));
}

#[tokio::test]
async fn test_find_missing_returns_none() {
    let pool = pool().await;
    assert!(VideoRepo::find_by_id(&pool, 999).await.unwrap().is_none());
}

#[tokio::test]
async fn test_ids_are_monotonic() {
    let pool = pool().await;
    let a = VideoRepo::create(&pool, &new_video("a.mp4", None)).await.unwrap();
    let b = VideoRepo::create(&pool, &new_video("b.mp4", None)).await.unwrap();
    assert!(b.id > a.id);
}

#[tokio::test]
async fn test_invalid_input_is_rejected_without_insert() {
    let pool = pool().await;
    let mut input = new_video("a.mp4", None);
    input.duration_secs = -1.0;

    let result = VideoRepo::create(&pool, &input).await;
    assert_matches!(result, Err(DbError::Invalid(CoreError::Validation(_))));
    assert_eq!(VideoRepo::count(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_storage_path_is_rejected() {
    let pool = pool().await;
    VideoRepo::create(&pool, &new_video("a.mp4", None)).await.unwrap();

    let mut dup = new_video("b.mp4", None);
    dup.storage_path = "uploads/a.mp4".into();
    let result = VideoRepo::create(&pool, &dup).await;
    assert_matches!(result, Err(DbError::Sqlx(_)));
    assert_eq!(VideoRepo::count(&pool).await.unwrap(), 1);
}

#[tokio::test]
async fn test_find_by_ids_ignores_missing_and_duplicates() {
    let pool = pool().await;
    let a = VideoRepo::create(&pool, &new_video("a.mp4", None)).await.unwrap();
    let b = VideoRepo::create(&pool, &new_video("b.mp4", None)).await.unwrap();

    let found = VideoRepo::find_by_ids(&pool, &[b.id, 404, a.id, b.id])
        .await
        .unwrap();
    let mut ids: Vec<i64> = found.iter().map(|v| v.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![a.id, b.id]);

    assert!(VideoRepo::find_by_ids(&pool, &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_newest_first_with_owner_filter() {
    let pool = pool().await;
    let a = VideoRepo::create(&pool, &new_video("a.mp4", Some(1))).await.unwrap();
    let b = VideoRepo::create(&pool, &new_video("b.mp4", Some(2))).await.unwrap();
    let c = VideoRepo::create(&pool, &new_video("c.mp4", Some(1))).await.unwrap();

    let all = VideoRepo::list(&pool, &VideoFilter::default()).await.unwrap();
    assert_eq!(
        all.iter().map(|v| v.id).collect::<Vec<_>>(),
        vec![c.id, b.id, a.id]
    );

    let mine = VideoRepo::list(
        &pool,
        &VideoFilter {
            owner_id: Some(1),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(mine.iter().map(|v| v.id).collect::<Vec<_>>(), vec![c.id, a.id]);

    let page = VideoRepo::list(
        &pool,
        &VideoFilter {
            owner_id: None,
            limit: Some(1),
            offset: Some(1),
        },
    )
    .await
    .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, b.id);
}

#[tokio::test]
async fn test_concurrent_creates_get_distinct_ids() {
    let pool = pool().await;
    let handles: Vec<_> = (0..10)
        .map(|i| {
            let pool = pool.clone();
            tokio::spawn(async move {
                VideoRepo::create(&pool, &new_video(&format!("{i}.mp4"), None))
                    .await
                    .unwrap()
                    .id
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 10);
    assert_eq!(VideoRepo::count(&pool).await.unwrap(), 10);
}
