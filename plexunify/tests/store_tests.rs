//! Catalog store reads and transactional apply

mod helpers;

use helpers::{TestCatalog, SECTION_ID};
use plexunify::commit::{self, AutoConfirm, CommitOptions};
use plexunify::ledger::{CollectionDeletion, Column, MutationLedger, Target};
use plexunify::types::{METADATA_TYPE_DELETED, TAG_TYPE_GENRE};
use plexunify::UnifyError;
use sqlx::Row;

#[tokio::test]
async fn test_resolve_section() {
    let catalog = TestCatalog::new().await;
    let store = catalog.store();

    assert_eq!(store.resolve_section("Movies").await.unwrap(), SECTION_ID);
    assert!(matches!(
        store.resolve_section("TV Shows").await,
        Err(UnifyError::Catalog(_))
    ));
}

#[tokio::test]
async fn test_movies_order_and_external_ids() {
    let catalog = TestCatalog::new().await;
    catalog.add_movie("Alien", "com.plexapp.agents.imdb://tt0078748?lang=en", "").await;
    catalog.add_movie("Brazil", "com.plexapp.agents.themoviedb://68?lang=en", "lockedFields=7").await;
    catalog.add_collection("Alien", "").await;

    let movies = catalog.store().movies(SECTION_ID, None).await.unwrap();
    let titles: Vec<&str> = movies.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, vec!["Brazil", "Alien"]);

    assert_eq!(movies[0].external.tmdb.as_deref(), Some("68"));
    assert_eq!(movies[1].external.imdb.as_deref(), Some("tt0078748"));
    assert_eq!(movies[0].locks.count(), 1);
}

#[tokio::test]
async fn test_null_columns_read_as_empty() {
    let catalog = TestCatalog::new().await;
    let id = sqlx::query("INSERT INTO metadata_items (library_section_id, metadata_type, title) VALUES (?, 1, 'Heat')")
        .bind(SECTION_ID)
        .execute(&catalog.pool)
        .await
        .unwrap()
        .last_insert_rowid();

    let record = catalog.store().record(id).await.unwrap().unwrap();
    assert_eq!(record.tagline, "");
    assert_eq!(record.content_rating, "");
    assert_eq!(record.locks.count(), 0);
}

#[tokio::test]
async fn test_deleted_records_are_invisible() {
    let catalog = TestCatalog::new().await;
    let (id, _) = catalog.add_collection("Saw", "").await;
    sqlx::query("UPDATE metadata_items SET metadata_type = -1 WHERE id = ?")
        .bind(id)
        .execute(&catalog.pool)
        .await
        .unwrap();

    let store = catalog.store();
    assert!(store.record(id).await.unwrap().is_none());
    assert!(store.collections_titled(SECTION_ID, "Saw").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_apply_stamps_rows() {
    let catalog = TestCatalog::new().await;
    let movie = catalog.add_movie("Heat", "", "").await;
    let other = catalog.add_movie("Ronin", "", "").await;
    let (_, tag) = catalog.add_collection("Crime", "").await;
    catalog.tag(other, tag).await;
    let genre = catalog.add_tag("Crime", TAG_TYPE_GENRE).await;

    let store = catalog.store();
    let mut ledger = MutationLedger::new();
    ledger.observe_record(&store.record(movie).await.unwrap().unwrap());
    ledger.stage(Target::MetadataItem(movie), Column::Tagline, "A Los Angeles crime saga");
    ledger.stage(Target::Tag(genre), Column::Tag, "Crime Drama");
    assert!(ledger.stage_insertion(movie, tag));

    let affected = store.apply(&ledger.plan(), 1_700_000_000).await.unwrap();
    assert_eq!(affected, 3);

    let row = sqlx::query("SELECT tagline, updated_at FROM metadata_items WHERE id = ?")
        .bind(movie)
        .fetch_one(&catalog.pool)
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("tagline"), "A Los Angeles crime saga");
    assert_eq!(row.get::<i64, _>("updated_at"), 1_700_000_000);

    let updated_at: i64 = sqlx::query_scalar("SELECT updated_at FROM tags WHERE id = ?")
        .bind(genre)
        .fetch_one(&catalog.pool)
        .await
        .unwrap();
    assert_eq!(updated_at, 1_700_000_000);

    // Appended after the existing member
    let row = sqlx::query("SELECT \"index\", created_at FROM taggings WHERE metadata_item_id = ? AND tag_id = ?")
        .bind(movie)
        .bind(tag)
        .fetch_one(&catalog.pool)
        .await
        .unwrap();
    assert_eq!(row.get::<i64, _>("index"), 1);
    assert_eq!(row.get::<i64, _>("created_at"), 1_700_000_000);
}

#[tokio::test]
async fn test_apply_skips_existing_membership() {
    let catalog = TestCatalog::new().await;
    let movie = catalog.add_movie("Heat", "", "").await;
    let (_, tag) = catalog.add_collection("Crime", "").await;
    catalog.tag(movie, tag).await;

    let mut ledger = MutationLedger::new();
    ledger.stage_insertion(movie, tag);

    let affected = catalog.store().apply(&ledger.plan(), 1).await.unwrap();
    assert_eq!(affected, 0);
    assert_eq!(catalog.tag_ids_of(movie).await, vec![tag]);
}

#[tokio::test]
async fn test_apply_removes_duplicate_membership() {
    let catalog = TestCatalog::new().await;
    let movie = catalog.add_movie("Alien", "", "").await;
    let sci_fi = catalog.add_tag("Science Fiction", TAG_TYPE_GENRE).await;
    let horror = catalog.add_tag("Horror", TAG_TYPE_GENRE).await;
    catalog.tag(movie, sci_fi).await;
    let duplicate = catalog.tag(movie, horror).await;

    let mut ledger = MutationLedger::new();
    ledger.stage(Target::Tagging(duplicate), Column::TagId, sci_fi);
    ledger.stage_removal(duplicate);

    let affected = catalog.store().apply(&ledger.plan(), 1).await.unwrap();
    assert_eq!(affected, 1);
    assert_eq!(catalog.tag_ids_of(movie).await, vec![sci_fi]);
    // The tag itself stays in the catalog
    assert_eq!(catalog.tags(TAG_TYPE_GENRE).await.len(), 2);
}

#[tokio::test]
async fn test_apply_deletion() {
    let catalog = TestCatalog::new().await;
    let movie = catalog.add_movie("Saw", "", "").await;
    let (collection, tag) = catalog.add_collection("Saw", "").await;
    catalog.tag(movie, tag).await;

    let mut ledger = MutationLedger::new();
    ledger.stage_deletion(CollectionDeletion {
        collection_id: collection,
        tag_id: Some(tag),
        title: "Saw".to_string(),
    });
    catalog.store().apply(&ledger.plan(), 1).await.unwrap();

    assert_eq!(catalog.metadata_type(collection).await, METADATA_TYPE_DELETED);
    assert!(catalog.tag_ids_of(movie).await.is_empty());
    assert_eq!(catalog.count("SELECT COUNT(*) FROM tags").await, 0);
}

#[tokio::test]
async fn test_apply_is_all_or_nothing() {
    let catalog = TestCatalog::new().await;
    let movie = catalog.add_movie("Heat", "", "").await;
    let store = catalog.store();

    let mut ledger = MutationLedger::new();
    ledger.observe_record(&store.record(movie).await.unwrap().unwrap());
    ledger.stage(Target::MetadataItem(movie), Column::TitleSort, "Heat : Heat");
    ledger.stage_insertion(movie, 99);

    // The insertion fails after the update ran
    sqlx::query("DROP TABLE taggings").execute(&catalog.pool).await.unwrap();

    assert!(matches!(
        store.apply(&ledger.plan(), 1).await,
        Err(UnifyError::Database(_))
    ));
    assert_eq!(catalog.text(movie, "title_sort").await.as_deref(), Some("Heat"));
    assert_eq!(catalog.text(movie, "updated_at").await, None);
}

#[tokio::test]
async fn test_failed_commit_writes_no_files() {
    let catalog = TestCatalog::new().await;
    let movie = catalog.add_movie("Saw", "", "").await;
    let (collection, tag) = catalog.add_collection("Saw", "").await;
    let poster = catalog.dir.path().join("posters").join(format!("collection-{}.jpg", collection));

    let mut ledger = MutationLedger::new();
    ledger.stage(Target::MetadataItem(collection), Column::UserThumbUrl, format!("file://{}", poster.display()));
    ledger.stage_artifact(poster.clone(), b"jpeg".to_vec());
    ledger.stage_insertion(movie, tag);

    sqlx::query("DROP TABLE taggings").execute(&catalog.pool).await.unwrap();

    let options = CommitOptions {
        backup_dir: catalog.backup_dir(),
        backup_stem: "library".to_string(),
        retention_count: 2,
        dry_run: false,
    };
    let result = commit::flush(&mut ledger, &catalog.store(), &options, &mut AutoConfirm(true)).await;

    assert!(matches!(result, Err(UnifyError::Database(_))));
    assert!(!poster.exists());
    assert_eq!(catalog.text(collection, "user_thumb_url").await.as_deref(), Some(""));
}
