//! End-to-end behaviour of the content cache against a real directory and
//! the platform file watcher.

use std::fs;
use std::path::Path;
use std::time::Duration;

use folio::cache::{CacheConfig, CacheError, ContentCache, Snapshot};
use tempfile::TempDir;
use tokio::time::{Instant, timeout_at};

const DEBOUNCE: Duration = Duration::from_millis(50);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

fn write_post(dir: &Path, file_name: &str, title: &str, created: &str) {
    let payload = format!(
        r#"{{"Title":"{title}","Created":"{created}","Summary":"About {title}","Body":"<p>{title}</p>"}}"#
    );
    fs::write(dir.join(file_name), payload).expect("write post");
}

fn keys(snapshot: &Snapshot) -> Vec<String> {
    snapshot
        .posts()
        .iter()
        .map(|post| post.key().to_string())
        .collect()
}

fn start(dir: &TempDir) -> ContentCache {
    ContentCache::start(CacheConfig::new(dir.path()).with_debounce(DEBOUNCE)).expect("cache start")
}

/// Wait until a published snapshot satisfies `ready`.
async fn wait_for(cache: &ContentCache, ready: impl Fn(&Snapshot) -> bool) -> bool {
    let deadline = Instant::now() + SETTLE_TIMEOUT;
    let mut generations = cache.store().subscribe();
    loop {
        if ready(&cache.snapshot()) {
            return true;
        }
        match timeout_at(deadline, generations.changed()).await {
            Ok(Ok(())) => continue,
            _ => return ready(&cache.snapshot()),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn initial_load_orders_and_keys_posts() {
    let dir = TempDir::new().expect("tempdir");
    write_post(dir.path(), "a.json", "Hello World", "2024-01-01T00:00:00Z");
    write_post(dir.path(), "b.json", "Second Post", "2024-02-01T00:00:00Z");

    let cache = start(&dir);

    let snapshot = cache.snapshot();
    assert_eq!(keys(&snapshot), ["second-post", "hello-world"]);

    let hello = cache.get("hello-world").expect("hello world is cached");
    assert_eq!(hello.title(), "Hello World");
    assert!(cache.get("missing").is_none());

    cache.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_file_is_published_after_quiet_window() {
    let dir = TempDir::new().expect("tempdir");
    write_post(dir.path(), "a.json", "Hello World", "2024-01-01T00:00:00Z");

    let cache = start(&dir);
    let before = cache.store().generation();

    write_post(dir.path(), "c.json", "Third Post", "2024-03-01T00:00:00Z");

    assert!(
        wait_for(&cache, |snapshot| snapshot.get("third-post").is_some()).await,
        "new post never appeared"
    );
    assert!(cache.store().generation() > before);
    assert_eq!(keys(&cache.snapshot()), ["third-post", "hello-world"]);

    cache.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn edits_and_removals_are_reflected() {
    let dir = TempDir::new().expect("tempdir");
    write_post(dir.path(), "a.json", "Hello World", "2024-01-01T00:00:00Z");
    write_post(dir.path(), "b.json", "Second Post", "2024-02-01T00:00:00Z");

    let cache = start(&dir);

    write_post(dir.path(), "a.json", "Hello Again", "2024-01-01T00:00:00Z");
    assert!(
        wait_for(&cache, |snapshot| snapshot.get("hello-again").is_some()).await,
        "edited title never appeared"
    );
    assert!(cache.get("hello-world").is_none());

    fs::remove_file(dir.path().join("b.json")).expect("remove post");
    assert!(
        wait_for(&cache, |snapshot| snapshot.get("second-post").is_none()).await,
        "removed post is still cached"
    );
    assert_eq!(keys(&cache.snapshot()), ["hello-again"]);

    cache.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_file_does_not_evict_valid_posts() {
    let dir = TempDir::new().expect("tempdir");
    write_post(dir.path(), "a.json", "Hello World", "2024-01-01T00:00:00Z");

    let cache = start(&dir);

    fs::write(dir.path().join("broken.json"), b"{ not json").expect("write broken");
    write_post(dir.path(), "b.json", "Second Post", "2024-02-01T00:00:00Z");

    assert!(
        wait_for(&cache, |snapshot| snapshot.get("second-post").is_some()).await,
        "valid post never appeared"
    );
    assert_eq!(cache.snapshot().len(), 2);

    cache.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unrelated_files_are_not_loaded() {
    let dir = TempDir::new().expect("tempdir");
    write_post(dir.path(), "a.json", "Hello World", "2024-01-01T00:00:00Z");
    fs::write(dir.path().join("notes.txt"), "scratch").expect("write notes");

    let cache = start(&dir);
    assert_eq!(keys(&cache.snapshot()), ["hello-world"]);

    cache.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_directory_fails_to_start() {
    let dir = TempDir::new().expect("tempdir");
    let missing = dir.path().join("absent");

    let result = ContentCache::start(CacheConfig::new(&missing));
    assert!(matches!(
        result,
        Err(CacheError::Watch(_) | CacheError::InitialLoad(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn recreated_directory_is_watched_again() {
    let dir = TempDir::new().expect("tempdir");
    let posts = dir.path().join("posts");
    fs::create_dir(&posts).expect("posts dir");
    write_post(&posts, "a.json", "Hello World", "2024-01-01T00:00:00Z");

    let cache = ContentCache::start(CacheConfig::new(&posts).with_debounce(DEBOUNCE))
        .expect("cache start");
    assert_eq!(keys(&cache.snapshot()), ["hello-world"]);

    fs::remove_dir_all(&posts).expect("remove posts dir");
    tokio::time::sleep(DEBOUNCE * 4).await;
    assert_eq!(
        keys(&cache.snapshot()),
        ["hello-world"],
        "a vanished directory keeps the last snapshot"
    );

    fs::create_dir(&posts).expect("recreate posts dir");
    write_post(&posts, "b.json", "Second Post", "2024-02-01T00:00:00Z");
    assert!(
        wait_for(&cache, |snapshot| snapshot.get("second-post").is_some()).await,
        "post written into the recreated directory never appeared"
    );

    tokio::time::sleep(DEBOUNCE * 4).await;
    write_post(&posts, "c.json", "Third Post", "2024-03-01T00:00:00Z");
    assert!(
        wait_for(&cache, |snapshot| snapshot.get("third-post").is_some()).await,
        "later post in the recreated directory never appeared"
    );
    assert_eq!(keys(&cache.snapshot()), ["third-post", "second-post"]);

    cache.shutdown().await;
}
