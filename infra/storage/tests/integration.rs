use shelf_storage::*;
use std::path::Path;
use tempfile::TempDir;

const CAST: &[u8] = b"{\"version\":2,\"width\":80,\"height\":24,\"timestamp\":1710500000}\n\
[0.5,\"o\",\"a\"]\n\
[2.3,\"o\",\"b\"]\n";

async fn open(temp: &TempDir) -> CastStore {
    CastStore::builder().root(temp.path().join("data")).connect().await.unwrap()
}

fn date(raw: &str) -> PartitionDate {
    PartitionDate::try_from(raw).unwrap()
}

#[tokio::test]
async fn test_upload_list_and_fetch_scenario() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp).await;

    let stored = store.store_on("alice", date("20240315"), CAST).await.unwrap();

    assert_eq!(stored.id.owner, "alice");
    assert_eq!(stored.id.date, "20240315");
    assert_eq!(stored.id.suffix.len(), 8);
    assert!(stored.id.suffix.bytes().all(|b| b.is_ascii_lowercase()));
    assert_eq!(stored.rel_path, format!("alice/20240315/{}", stored.id.suffix));
    assert_eq!(stored.size, CAST.len() as u64);
    assert_eq!(stored.header.width, 80);
    assert_eq!(CastId::decode(&stored.token).unwrap(), stored.id);

    let on_disk = store.root().join(stored.id.relative_path());
    assert_eq!(std::fs::read(&on_disk).unwrap(), CAST);
    assert!(!tmp_path(&on_disk).exists());

    let listed = store.list("alice").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].token, stored.token);
    assert_eq!(listed[0].size, CAST.len() as u64);
    assert!(listed[0].modified.is_some());
    let header = listed[0].header.as_ref().unwrap();
    assert!((header.duration.unwrap() - 2.3).abs() < f64::EPSILON);

    let by_token = store.fetch_by_token(&stored.token).await.unwrap();
    let by_path = store.fetch_by_path(&stored.rel_path).await.unwrap();
    assert_eq!(by_token.path, by_path.path);
    assert_eq!(by_token.size, CAST.len() as u64);
}

#[tokio::test]
async fn test_store_uses_today_partition() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp).await;

    let stored = store.store("bob", CAST).await.unwrap();
    let today = PartitionDate::today();

    // Midnight may pass between the two clock reads.
    assert!(stored.id.date == today.as_str() || stored.id.date.as_str() < today.as_str());
}

#[tokio::test]
async fn test_list_orders_newest_partition_first() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp).await;

    for day in ["20240101", "20240315", "20231231", "20240315"] {
        store.store_on("alice", date(day), CAST).await.unwrap();
    }

    let listed = store.list("alice").await.unwrap();
    let dates: Vec<_> = listed.iter().map(|c| c.id.date.as_str()).collect();
    assert_eq!(dates, ["20240315", "20240315", "20240101", "20231231"]);
    assert!(listed[0].id.suffix < listed[1].id.suffix);
}

#[tokio::test]
async fn test_list_skips_noise_and_tolerates_bad_headers() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp).await;
    let stored = store.store_on("alice", date("20240315"), CAST).await.unwrap();

    let part = store.root().join("alice").join("20240315");
    std::fs::write(part.join("zzzzzzzz.cast.tmp"), b"partial").unwrap();
    std::fs::write(part.join("notes.txt"), b"hello").unwrap();
    std::fs::create_dir(part.join("dir.cast")).unwrap();
    std::fs::write(part.join("broken00.cast"), b"not a header\n").unwrap();
    std::fs::create_dir_all(store.root().join("alice").join("misc")).unwrap();
    std::fs::write(store.root().join("alice").join("misc").join("x.cast"), CAST).unwrap();

    let listed = store.list("alice").await.unwrap();
    let suffixes: Vec<_> = listed.iter().map(|c| c.id.suffix.clone()).collect();
    assert_eq!(suffixes.len(), 2);
    assert!(suffixes.contains(&stored.id.suffix));
    let broken = listed.iter().find(|c| c.id.suffix == "broken00").unwrap();
    assert!(broken.header.is_none());
}

#[tokio::test]
async fn test_list_of_unknown_owner_is_empty() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp).await;

    assert!(store.list("nobody").await.unwrap().is_empty());
    assert!(!store.owner_exists("nobody").await);
    assert!(matches!(store.list("../etc").await, Err(StorageError::Validation { .. })));
}

#[tokio::test]
async fn test_rejects_invalid_uploads() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp).await;

    let empty: &[u8] = b"";
    assert!(matches!(
        store.store_on("alice", date("20240315"), empty).await,
        Err(StorageError::Validation { .. })
    ));

    let bad_header: &[u8] = b"[0.5,\"o\",\"a\"]\n";
    assert!(matches!(
        store.store_on("alice", date("20240315"), bad_header).await,
        Err(StorageError::Parse { .. })
    ));

    assert!(matches!(
        store.store_on("../alice", date("20240315"), CAST).await,
        Err(StorageError::Validation { .. })
    ));

    let part = store.root().join("alice").join("20240315");
    let leftovers = std::fs::read_dir(&part).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_path_traversal_blocked() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp).await;
    std::fs::write(temp.path().join("secret.cast"), CAST).unwrap();

    for rel in ["../secret", "../secret.cast", "/etc/passwd", "alice/../../secret"] {
        assert!(
            matches!(store.fetch_by_path(rel).await, Err(StorageError::PathTraversal { .. })),
            "{rel} should be blocked"
        );
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_escape_blocked() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp).await;

    let outside = temp.path().join("outside");
    std::fs::create_dir_all(&outside).unwrap();
    std::fs::write(outside.join("loot.cast"), CAST).unwrap();
    std::os::unix::fs::symlink(&outside, store.root().join("mallory")).unwrap();

    assert!(matches!(
        store.fetch_by_path("mallory/loot").await,
        Err(StorageError::PathTraversal { .. })
    ));
    assert!(matches!(
        store.store_on("mallory", date("20240315"), CAST).await,
        Err(StorageError::PathTraversal { .. })
    ));
}

#[tokio::test]
async fn test_malformed_token_differs_from_missing_cast() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp).await;

    assert!(matches!(
        store.fetch_by_token("%%%not-a-token").await,
        Err(StorageError::InvalidToken { .. })
    ));

    let missing = CastId::new("alice", "20240315", "abcdefgh").encode();
    assert!(matches!(store.fetch_by_token(&missing).await, Err(StorageError::NotFound { .. })));
    assert!(matches!(
        store.fetch_by_path("alice/20240315").await,
        Err(StorageError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_duration_backfill_is_skipped_when_present() {
    let header = CastHeader { duration: Some(4.0), ..CastHeader::default() };

    // The path does not exist: a scan would fail with NotFound.
    let sentinel = Path::new("/nonexistent/never/opened.cast");
    let result = compute_duration(sentinel, &header).await.unwrap();
    assert_eq!(result, header);

    let zero = CastHeader { duration: Some(0.0), ..CastHeader::default() };
    assert!(matches!(
        compute_duration(sentinel, &zero).await,
        Err(StorageError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_duration_backfill_skips_scan_of_sentinel_file() {
    let temp = TempDir::new().unwrap();
    let sentinel = temp.path().join("sentinel.cast");
    std::fs::write(
        &sentinel,
        b"{\"version\":2,\"width\":80,\"height\":24,\"duration\":4.0}\n[1.0,\"o\",\"a\"]\n[9.5,\"o\",\"b\"]\n",
    )
    .unwrap();

    let declared = extract_header(&sentinel).await.unwrap();
    assert_eq!(declared.duration, Some(4.0));
    assert_eq!(compute_duration(&sentinel, &declared).await.unwrap().duration, Some(4.0));
    assert_eq!(inspect(&sentinel).await.unwrap().duration, Some(4.0));

    // Without a declared duration the same file scans to a different value.
    let undeclared = CastHeader { duration: None, ..declared };
    let first = compute_duration(&sentinel, &undeclared).await.unwrap();
    let second = compute_duration(&sentinel, &undeclared).await.unwrap();
    assert_eq!(first.duration, Some(9.5));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_zero_duration_backfill_is_stable() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("idle.cast");
    std::fs::write(&path, b"{\"version\":2,\"width\":80,\"height\":24}\n").unwrap();

    let header = extract_header(&path).await.unwrap();
    let scanned = compute_duration(&path, &header).await.unwrap();
    let rescanned = compute_duration(&path, &scanned).await.unwrap();
    assert_eq!(scanned.duration, Some(0.0));
    assert_eq!(rescanned, scanned);
}

#[tokio::test]
async fn test_header_only_cast_has_zero_duration() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a.cast");
    std::fs::write(&path, b"{\"version\":2,\"width\":80,\"height\":24}\n").unwrap();

    let header = inspect(&path).await.unwrap();
    assert_eq!(header.duration, Some(0.0));

    let empty = temp.path().join("empty.cast");
    std::fs::write(&empty, b"").unwrap();
    assert!(matches!(extract_header(&empty).await, Err(StorageError::Parse { .. })));
}

#[tokio::test]
async fn test_credentials_lifecycle() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp).await;

    let (first, created) = store.register_owner("alice").await.unwrap();
    assert!(created);
    let (again, created) = store.register_owner("alice").await.unwrap();
    assert!(!created);
    assert_eq!(first, again);

    let stored = std::fs::read_to_string(store.root().join("alice").join(MACHINE_ID_FILE)).unwrap();
    assert_eq!(stored, format!("{}\n", first.expose()));
    assert_eq!(store.machine_credential("alice").await.unwrap(), first);

    store.verify_credential("alice", first.expose()).await.unwrap();
    assert!(matches!(
        store.verify_credential("alice", "wrong").await,
        Err(StorageError::Auth { .. })
    ));
    assert!(matches!(
        store.verify_credential("nobody", first.expose()).await,
        Err(StorageError::Auth { .. })
    ));
    assert!(matches!(
        store.verify_credential("../alice", first.expose()).await,
        Err(StorageError::Auth { .. })
    ));

    store.register_owner("bob").await.unwrap();
    std::fs::create_dir_all(store.root().join("stray")).unwrap();
    let owners: Vec<_> = store.list_owners().await.unwrap().iter().map(ToString::to_string).collect();
    assert_eq!(owners, ["alice", "bob"]);
    assert!(store.owner_exists("alice").await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_creates_one_credential() {
    for _ in 0..10 {
        let temp = TempDir::new().unwrap();
        let store = open(&temp).await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.register_owner("alice").await })
            })
            .collect();

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap().unwrap());
        }

        let stored = store.machine_credential("alice").await.unwrap();
        assert_eq!(results.iter().filter(|(_, created)| *created).count(), 1);
        assert!(results.iter().all(|(credential, _)| *credential == stored));
        store.verify_credential("alice", stored.expose()).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(store.root().join("alice"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, [MACHINE_ID_FILE]);
    }
}

#[tokio::test]
async fn test_connect_requires_root_when_create_disabled() {
    let temp = TempDir::new().unwrap();
    let result = CastStore::builder().root(temp.path().join("missing")).create(false).connect().await;
    assert!(matches!(result, Err(StorageError::Io { .. })));
}

#[tokio::test]
async fn test_connect_keeps_fresh_tmp_files() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("data");
    let part = root.join("alice").join("20240315");
    std::fs::create_dir_all(&part).unwrap();
    std::fs::write(part.join("abcdefgh.cast.tmp"), b"in flight").unwrap();

    let _store = CastStore::builder().root(&root).connect().await.unwrap();

    assert!(part.join("abcdefgh.cast.tmp").exists());
}
