use std::path::PathBuf;

use rendezvous::kernel::AccountId;
use rendezvous::services::{AccountRecord, AccountStore, JsonFileStore, MemoryStore, ScheduleRecord};

fn temp_path(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("rendezvous-{}-{}.json", name, std::process::id()));
    let _ = std::fs::remove_file(&path);
    path
}

fn record(event_id: u32, next_action_at: i64) -> ScheduleRecord {
    ScheduleRecord {
        event_id,
        last_claim: next_action_at - 3600,
        next_action_at,
        step: 2,
        tier: 1,
        exp: 150,
    }
}

#[tokio::test]
async fn test_missing_file_is_empty() {
    let store = JsonFileStore::new(temp_path("missing"));
    assert!(store.list_accounts().await.unwrap().is_empty());
    assert!(store.load_schedule(&AccountId::new("alice")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_schedule_survives_reopen() {
    let path = temp_path("reopen");
    let alice = AccountId::new("alice");
    {
        let store = JsonFileStore::new(&path);
        store.upsert_account(AccountRecord::new("alice", 1001, 1_010_000_000_001)).await.unwrap();
        store.upsert_account(AccountRecord::new("bob", 1002, 1_010_000_000_002)).await.unwrap();
        store.save_schedule(&alice, record(7, 5000)).await.unwrap();
    }

    let store = JsonFileStore::new(&path);
    let accounts = store.list_accounts().await.unwrap();
    assert_eq!(accounts.len(), 2);
    assert_eq!(store.load_schedule(&alice).await.unwrap(), Some(record(7, 5000)));
    assert_eq!(store.load_schedule(&AccountId::new("bob")).await.unwrap(), None);

    assert!(store.remove_account(&alice).await.unwrap());
    assert!(!store.remove_account(&alice).await.unwrap());
    assert_eq!(store.list_accounts().await.unwrap().len(), 1);

    let _ = std::fs::remove_file(&path);
    println!("Store: schedules persist across reopen");
}

#[tokio::test]
async fn test_unknown_account_schedule_is_dropped() {
    let path = temp_path("unknown");
    let store = JsonFileStore::new(&path);
    store.upsert_account(AccountRecord::new("alice", 1, 1010)).await.unwrap();

    store.save_schedule(&AccountId::new("mallory"), record(7, 10)).await.unwrap();

    let accounts = store.list_accounts().await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert!(accounts[0].schedule.is_none());
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_reads_hand_written_document() {
    let path = temp_path("handwritten");
    std::fs::write(
        &path,
        r#"{"accounts": [{"id": "main", "login_id": "123456", "user_id": 1010000123456}]}"#,
    )
    .unwrap();

    let store = JsonFileStore::new(&path);
    let accounts = store.list_accounts().await.unwrap();
    assert_eq!(accounts, vec![AccountRecord::new("main", 123456, 1_010_000_123_456)]);
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_memory_store() {
    let store = MemoryStore::new(vec![AccountRecord::new("alice", 1, 1010)]);
    let alice = AccountId::new("alice");

    store.save_schedule(&alice, record(7, 99)).await.unwrap();
    assert_eq!(store.load_schedule(&alice).await.unwrap(), Some(record(7, 99)));

    store.remove(&alice).await;
    assert!(store.list_accounts().await.unwrap().is_empty());
}
