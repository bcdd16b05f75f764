//! Basic usage example for eventlog: create a namespace, write a few
//! messages, read them back by stream and by category, and watch a live
//! subscription pick up a write that happens after it starts.

use std::collections::HashMap;

use eventlog::api::auth;
use eventlog::pubsub::PubSubBus;
use eventlog::query::{self, CategoryScanOptions, StreamScanOptions};
use eventlog::store::NamespaceStoreManager;
use eventlog::subscription::{self, SubscriptionRequest};
use eventlog::write::{commit, WriteRequest};
use futures::stream::StreamExt;
use serde_json::json;

#[tokio::main]
async fn main() -> eventlog::Result<()> {
    println!("=== eventlog Basic Usage Example ===\n");

    let temp_dir = tempfile::tempdir().unwrap();
    println!("Using temporary storage at: {:?}", temp_dir.path());
    let store = NamespaceStoreManager::open_on_disk(temp_dir.path().to_path_buf(), redb::Durability::Eventual)?;
    let bus = PubSubBus::new();

    println!("Creating namespace 'demo'...");
    let secret = "demo-secret";
    store
        .create_namespace("demo", &auth::hash_credential(secret), "example tenant".to_string(), HashMap::new())
        .await?;
    let handle = store.handle("demo").await?;

    println!("Writing a few messages to account-1 and account-2...\n");
    commit(
        &handle,
        "demo",
        &bus,
        false,
        WriteRequest {
            stream: "account-1".to_string(),
            event_type: "Opened".to_string(),
            data: json!({"balance": 0}),
            metadata: None,
            id: None,
            expected_version: None,
        },
    )
    .await?;
    commit(
        &handle,
        "demo",
        &bus,
        false,
        WriteRequest {
            stream: "account-1".to_string(),
            event_type: "Deposited".to_string(),
            data: json!({"amount": 100}),
            metadata: None,
            id: None,
            expected_version: Some(0),
        },
    )
    .await?;
    commit(
        &handle,
        "demo",
        &bus,
        false,
        WriteRequest {
            stream: "account-2".to_string(),
            event_type: "Opened".to_string(),
            data: json!({"balance": 0}),
            metadata: None,
            id: None,
            expected_version: None,
        },
    )
    .await?;

    println!("Reading account-1's stream:");
    let messages = query::stream_scan(handle.kv.as_ref(), "account-1", StreamScanOptions::default())?;
    for message in &messages {
        println!("  {} position={} type={}", message.stream_name, message.position, message.event_type);
    }

    println!("\nReading the whole 'account' category ordered by arrival:");
    let category_messages = query::category_scan(handle.kv.as_ref(), "account", CategoryScanOptions::default())?;
    for message in &category_messages {
        println!("  {} gp={} type={}", message.stream_name, message.global_position, message.event_type);
    }

    println!("\nSubscribing to the 'account' category, then writing one more message...");
    let request = SubscriptionRequest {
        category: Some("account".to_string()),
        ..Default::default()
    };
    let (_subscription, stream) = subscription::subscribe(handle.kv.clone(), &bus, "demo", request)?;
    tokio::pin!(stream);

    // Drain the catch-up pokes for the three messages already written.
    for _ in 0..3 {
        let poke = stream.next().await.unwrap();
        println!("  catch-up poke: {} position={}", poke.stream, poke.position);
    }

    commit(
        &handle,
        "demo",
        &bus,
        false,
        WriteRequest {
            stream: "account-2".to_string(),
            event_type: "Deposited".to_string(),
            data: json!({"amount": 50}),
            metadata: None,
            id: None,
            expected_version: Some(0),
        },
    )
    .await?;
    let live_poke = stream.next().await.unwrap();
    println!("  live poke: {} position={}", live_poke.stream, live_poke.position);

    println!("\nDone.");
    Ok(())
}
