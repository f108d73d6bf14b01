use std::sync::Arc;

use chrono::Utc;
use shared::{
    domain::{ChannelId, ChannelKind, Owner},
    protocol::ChannelRecord,
};
use storage::{MemoryStore, NewEnvelope, RecordStore, Storage};

fn channel(url: &str) -> ChannelRecord {
    ChannelRecord {
        id: ChannelId::generate(),
        channel_type: ChannelKind::X,
        channel_url: url.to_string(),
        channel_description: "extract headlines".to_string(),
        created_at: Utc::now(),
    }
}

async fn append_concurrently(store: Arc<dyn RecordStore>, appends: usize) {
    let owner = Owner::new("ana@example.com");
    store
        .insert_envelope(
            &owner,
            &NewEnvelope {
                name: "AI Watch".into(),
                color: "#60A5FA".into(),
                description: None,
            },
        )
        .await
        .expect("insert");

    let tasks = (0..appends).map(|n| {
        let store = store.clone();
        let owner = owner.clone();
        tokio::spawn(async move {
            store
                .append_channel(&owner, "AI Watch", &channel(&format!("https://x.com/{n}")))
                .await
                .expect("append")
        })
    });
    for joined in futures::future::join_all(tasks).await {
        joined.expect("task");
    }

    let detail = store
        .load_envelope_detail(&owner, "AI Watch")
        .await
        .expect("detail");
    assert_eq!(detail.channels.len(), appends, "no addition may be lost");
    assert_eq!(detail.envelope.channel_count, appends as i64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_to_sqlite_lose_nothing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("appends.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));
    let storage = Storage::new(&database_url).await.expect("db");

    append_concurrently(Arc::new(storage), 8).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_to_memory_store_lose_nothing() {
    append_concurrently(Arc::new(MemoryStore::new()), 8).await;
}
