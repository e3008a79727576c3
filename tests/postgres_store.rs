//! Store tests against a live PostgreSQL server
//!
//! Ignored by default. Run with `cargo test --test postgres_store -- --ignored`
//! once the database from `configuration.yaml` is reachable; each test creates
//! its own throwaway database.

use blog_backend::configuration::{get_configuration, DatabaseSettings};
use blog_backend::models::{PageRequest, Post, PostStatus, User};
use blog_backend::store::{PgPostStore, PgUserStore, PostStore, StoreError, UserStore};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;

async fn configure_database() -> PgPool {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = Uuid::new_v4().to_string();
    let config: DatabaseSettings = configuration.database;

    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate the database.");
    pool
}

fn user(email: &str) -> User {
    User::new(email.to_string(), "Ada".to_string(), "Lovelace".to_string(), "hash".to_string())
}

#[tokio::test]
#[ignore = "needs a PostgreSQL server"]
async fn rotate_is_a_compare_and_swap() {
    let store = PgUserStore::new(configure_database().await);
    let u = user("cas@example.com");
    store.create(&u).await.unwrap();
    store.update_refresh_token(u.id, Some("one")).await.unwrap();

    assert!(store.rotate_refresh_token(u.id, "one", "two").await.unwrap());
    assert!(!store.rotate_refresh_token(u.id, "one", "three").await.unwrap());

    let stored = store.find_by_id(u.id).await.unwrap().unwrap();
    assert_eq!(stored.refresh_token_hash.as_deref(), Some("two"));
}

#[tokio::test]
#[ignore = "needs a PostgreSQL server"]
async fn concurrent_rotations_have_one_winner() {
    let store = std::sync::Arc::new(PgUserStore::new(configure_database().await));
    let u = user("race@example.com");
    store.create(&u).await.unwrap();
    store.update_refresh_token(u.id, Some("seed")).await.unwrap();

    let attempts = (0..8).map(|i| {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .rotate_refresh_token(u.id, "seed", &format!("next-{}", i))
                .await
                .unwrap()
        })
    });
    let mut winners = 0;
    for attempt in attempts.collect::<Vec<_>>() {
        if attempt.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
#[ignore = "needs a PostgreSQL server"]
async fn password_replacement_clears_refresh_slot() {
    let store = PgUserStore::new(configure_database().await);
    let u = user("pw@example.com");
    store.create(&u).await.unwrap();
    store.update_refresh_token(u.id, Some("one")).await.unwrap();

    store.replace_password(u.id, "new-hash").await.unwrap();

    let stored = store.find_by_id(u.id).await.unwrap().unwrap();
    assert_eq!(stored.password_hash, "new-hash");
    assert!(stored.refresh_token_hash.is_none());
}

#[tokio::test]
#[ignore = "needs a PostgreSQL server"]
async fn deleted_user_frees_email_and_disappears() {
    let store = PgUserStore::new(configure_database().await);
    let u = user("gone@example.com");
    store.create(&u).await.unwrap();

    assert!(matches!(store.create(&user("gone@example.com")).await, Err(StoreError::Duplicate(_))));

    store.delete(u.id).await.unwrap();
    assert!(store.find_by_id(u.id).await.unwrap().is_none());
    assert_eq!(store.delete(u.id).await, Err(StoreError::NotFound));
    store.create(&user("gone@example.com")).await.unwrap();
}

#[tokio::test]
#[ignore = "needs a PostgreSQL server"]
async fn post_queries_respect_status_and_search() {
    let pool = configure_database().await;
    let users = PgUserStore::new(pool.clone());
    let posts = PgPostStore::new(pool);
    let author = user("author@example.com");
    users.create(&author).await.unwrap();

    let live = Post::new(author.id, "Ownership in Rust".into(), "borrowing".into(), String::new(), PostStatus::Published);
    let draft = Post::new(author.id, "Rust draft".into(), "body".into(), String::new(), PostStatus::Draft);
    posts.create(&live).await.unwrap();
    posts.create(&draft).await.unwrap();

    let (_, total) = posts.list_published(&PageRequest::default()).await.unwrap();
    assert_eq!(total, 1);
    let (_, total) = posts.list_all(&PageRequest::default()).await.unwrap();
    assert_eq!(total, 2);
    let (_, total) = posts.list_by_author(author.id, &PageRequest::default()).await.unwrap();
    assert_eq!(total, 2);

    let (hits, total) = posts.search("rust", &PageRequest::default()).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(hits[0].id, live.id);

    let found = posts.find_by_slug(&live.slug).await.unwrap().unwrap();
    assert_eq!(found.id, live.id);

    let (empty, _) = posts.list_published(&PageRequest::new(i64::MAX, 100)).await.unwrap();
    assert!(empty.is_empty());
}
