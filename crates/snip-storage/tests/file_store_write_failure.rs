//! Runs in its own test binary: the file size limit it lowers applies to the
//! whole process.

#![cfg(unix)]

use nix::sys::resource::{getrlimit, setrlimit, Resource};
use nix::sys::signal::{signal, SigHandler, Signal};
use snip_core::{ShortCode, UserId};
use snip_storage::{FileStore, ReadStore, StorageError, Store};
use tempfile::TempDir;

fn code(value: &str) -> ShortCode {
    ShortCode::new_unchecked(value)
}

async fn log_len(path: &std::path::Path) -> u64 {
    tokio::fs::metadata(path).await.unwrap().len()
}

#[tokio::test]
async fn partially_written_append_is_rolled_back() {
    // Writing past RLIMIT_FSIZE raises SIGXFSZ, which terminates by default.
    unsafe { signal(Signal::SIGXFSZ, SigHandler::SigIgn) }.unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("storage.json");
    let owner = UserId::from("user1");
    let store = FileStore::open(&path).await.unwrap();
    store
        .save(&code("first01"), "https://first.example", &owner)
        .await
        .unwrap();
    let before = log_len(&path).await;

    // Room for the start of the next line, not the whole of it.
    let (soft, hard) = getrlimit(Resource::RLIMIT_FSIZE).unwrap();
    setrlimit(Resource::RLIMIT_FSIZE, before + 20, hard).unwrap();
    let failed = store
        .save(&code("fail001"), "https://fail.example/some/longer/path", &owner)
        .await;
    setrlimit(Resource::RLIMIT_FSIZE, soft, hard).unwrap();

    assert!(matches!(failed, Err(StorageError::Io(_))), "{failed:?}");
    assert!(matches!(
        store.get(&code("fail001")).await,
        Err(StorageError::NotFound(_))
    ));
    assert!(matches!(
        store
            .get_by_original_url("https://fail.example/some/longer/path")
            .await,
        Err(StorageError::NotFound(_))
    ));
    assert_eq!(log_len(&path).await, before);

    store
        .save(&code("after01"), "https://after.example", &owner)
        .await
        .unwrap();
    store.close().await.unwrap();
    drop(store);

    let reopened = FileStore::open(&path).await.unwrap();
    assert_eq!(
        reopened.get(&code("first01")).await.unwrap(),
        "https://first.example"
    );
    assert_eq!(
        reopened.get(&code("after01")).await.unwrap(),
        "https://after.example"
    );
    assert!(matches!(
        reopened.get(&code("fail001")).await,
        Err(StorageError::NotFound(_))
    ));
    let listed = reopened.get_all_by_user(&owner).await.unwrap();
    assert_eq!(listed.len(), 2);
}
