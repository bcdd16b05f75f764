//! RPC method dispatch: the single `POST /rpc` surface, `[method, params]`
//! in, a JSON result or a `{code, message}` error out. Every method here
//! takes its arguments positionally — `params[i]`, not a named object.
//!
//! `ns.create`/`ns.list`/`ns.delete` are namespace *management*
//! operations, not namespace-*scoped* ones: there's no separate admin
//! credential, so here they run against whichever namespace the caller's
//! token happened to authenticate as long as that token is valid at all
//! (the same [`crate::api::auth`] check every other method goes through).
//! A deployment that wants these locked down further would add a distinct
//! admin scope.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::pubsub::PubSubBus;
use crate::query::{self, CategoryScanOptions, ConsumerGroup, StreamListingOptions, StreamScanOptions};
use crate::store::NamespaceStoreManager;
use crate::write::{self, WriteRequest};

/// Everything a dispatched call needs: the resolved namespace, and the
/// shared engine handles to act against it.
pub struct RpcContext<'a> {
    pub store: &'a NamespaceStoreManager,
    pub bus: &'a Arc<PubSubBus>,
    pub namespace_id: &'a str,
    pub compress: bool,
}

/// Dispatches one `[method, params]` call and returns its JSON result.
pub async fn dispatch(ctx: &RpcContext<'_>, method: &str, params: Vec<Value>) -> Result<Value> {
    match method {
        "stream.write" => stream_write(ctx, params).await,
        "stream.get" => stream_get(ctx, params).await,
        "stream.last" => stream_last(ctx, params).await,
        "stream.version" => stream_version(ctx, params).await,
        "category.get" => category_get(ctx, params).await,
        "ns.create" => ns_create(ctx, params).await,
        "ns.delete" => ns_delete(ctx, params).await,
        "ns.list" => ns_list(ctx).await,
        "ns.info" => ns_info(ctx).await,
        "ns.streams" => ns_streams(ctx, params).await,
        "ns.categories" => ns_categories(ctx).await,
        "sys.version" => Ok(sys_version()),
        "sys.health" => Ok(sys_health()),
        other => Err(Error::MethodNotFound(other.to_string())),
    }
}

fn param(params: &[Value], index: usize) -> &Value {
    params.get(index).unwrap_or(&Value::Null)
}

fn require_str(params: &[Value], index: usize, name: &str) -> Result<String> {
    param(params, index)
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_request(format!("{name} must be a string")))
}

fn opt_str(params: &[Value], index: usize) -> Option<String> {
    param(params, index).as_str().map(str::to_string)
}

fn opt_u64(params: &[Value], index: usize) -> Option<u64> {
    param(params, index).as_u64()
}

fn opt_i64(params: &[Value], index: usize) -> Option<i64> {
    param(params, index).as_i64()
}

async fn stream_write(ctx: &RpcContext<'_>, params: Vec<Value>) -> Result<Value> {
    let stream = require_str(&params, 0, "stream")?;
    let event_type = require_str(&params, 1, "type")?;
    let data = param(&params, 2).clone();
    let metadata = match param(&params, 3) {
        Value::Null => None,
        other => Some(other.clone()),
    };
    let id = opt_str(&params, 4);
    let expected_version = opt_i64(&params, 5);

    let handle = ctx.store.handle(ctx.namespace_id).await?;
    let result = write::commit(
        &handle,
        ctx.namespace_id,
        ctx.bus,
        ctx.compress,
        WriteRequest { stream, event_type, data, metadata, id, expected_version },
    )
    .await?;

    Ok(json!({ "position": result.position, "globalPosition": result.global_position }))
}

async fn stream_get(ctx: &RpcContext<'_>, params: Vec<Value>) -> Result<Value> {
    let stream = require_str(&params, 0, "stream")?;
    crate::types::validate_stream_name(&stream)?;
    let opts = StreamScanOptions {
        start_position: opt_u64(&params, 1).unwrap_or(0),
        batch_size: opt_i64(&params, 2),
        global_position_filter: opt_u64(&params, 3),
    };
    let handle = ctx.store.handle(ctx.namespace_id).await?;
    let messages = query::stream_scan(handle.kv.as_ref(), &stream, opts)?;
    Ok(Value::Array(messages.iter().map(|m| m.to_wire_tuple()).collect()))
}

async fn stream_last(ctx: &RpcContext<'_>, params: Vec<Value>) -> Result<Value> {
    let stream = require_str(&params, 0, "stream")?;
    crate::types::validate_stream_name(&stream)?;
    let event_type = opt_str(&params, 1);
    let handle = ctx.store.handle(ctx.namespace_id).await?;
    let message = query::last_of_type(handle.kv.as_ref(), &stream, event_type.as_deref())?;
    Ok(message.to_wire_tuple())
}

async fn stream_version(ctx: &RpcContext<'_>, params: Vec<Value>) -> Result<Value> {
    let stream = require_str(&params, 0, "stream")?;
    crate::types::validate_stream_name(&stream)?;
    let handle = ctx.store.handle(ctx.namespace_id).await?;
    let version = query::version(handle.kv.as_ref(), &stream)?;
    Ok(json!(version))
}

fn consumer_group_from(
    params: &[Value],
    member_index: usize,
    size_index: usize,
) -> Result<Option<ConsumerGroup>> {
    let (Some(member), Some(size)) = (opt_u64(params, member_index), opt_u64(params, size_index)) else {
        return Ok(None);
    };
    ConsumerGroup::new(member, size).map(Some)
}

async fn category_get(ctx: &RpcContext<'_>, params: Vec<Value>) -> Result<Value> {
    let category = require_str(&params, 0, "category")?;
    let opts = CategoryScanOptions {
        start_global_position: opt_u64(&params, 1).unwrap_or(0),
        batch_size: opt_i64(&params, 2),
        consumer_group: consumer_group_from(&params, 3, 4)?,
        correlation: opt_str(&params, 5),
    };
    let handle = ctx.store.handle(ctx.namespace_id).await?;
    let messages = query::category_scan(handle.kv.as_ref(), &category, opts)?;
    Ok(Value::Array(messages.iter().map(|m| m.to_wire_tuple()).collect()))
}

async fn ns_create(ctx: &RpcContext<'_>, params: Vec<Value>) -> Result<Value> {
    let id = require_str(&params, 0, "id")?;
    let description = opt_str(&params, 1).unwrap_or_default();
    let metadata = match param(&params, 2) {
        Value::Object(map) => map.clone().into_iter().collect(),
        _ => Default::default(),
    };

    let secret = uuid::Uuid::new_v4().to_string();
    let credential_hash = crate::api::auth::hash_credential(&secret);
    let namespace = ctx
        .store
        .create_namespace(&id, &credential_hash, description, metadata)
        .await?;

    Ok(json!({
        "namespace": namespace.id,
        "token": format!("{id}.{secret}"),
        "createdAt": namespace.created_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    }))
}

async fn ns_delete(ctx: &RpcContext<'_>, params: Vec<Value>) -> Result<Value> {
    let id = require_str(&params, 0, "id")?;
    // Count messages before tearing the namespace's storage down — the
    // handle (and its backing store) is gone once `delete_namespace` returns.
    let messages_deleted = match ctx.store.handle(&id).await {
        Ok(handle) => query::list_categories(handle.kv.as_ref())?
            .iter()
            .map(|c| c.message_count)
            .sum(),
        Err(_) => 0,
    };
    ctx.store.delete_namespace(&id).await?;
    Ok(json!({
        "namespace": id,
        "deletedAt": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "messagesDeleted": messages_deleted,
    }))
}

async fn ns_list(ctx: &RpcContext<'_>) -> Result<Value> {
    let namespaces = ctx.store.registry().list()?;
    Ok(Value::Array(
        namespaces
            .into_iter()
            .map(|n| {
                json!({
                    "namespace": n.id,
                    "description": n.description,
                    "createdAt": n.created_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                })
            })
            .collect(),
    ))
}

async fn ns_info(ctx: &RpcContext<'_>) -> Result<Value> {
    let namespace = ctx
        .store
        .registry()
        .get(ctx.namespace_id)?
        .ok_or_else(|| Error::NamespaceNotFound(ctx.namespace_id.to_string()))?;
    let handle = ctx.store.handle(ctx.namespace_id).await?;
    let categories = query::list_categories(handle.kv.as_ref())?;
    let stream_count: usize = categories.iter().map(|c| c.stream_count).sum();
    let message_count: usize = categories.iter().map(|c| c.message_count).sum();

    Ok(json!({
        "namespace": namespace.id,
        "description": namespace.description,
        "createdAt": namespace.created_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "streamCount": stream_count,
        "messageCount": message_count,
    }))
}

async fn ns_streams(ctx: &RpcContext<'_>, params: Vec<Value>) -> Result<Value> {
    let opts = StreamListingOptions {
        prefix: opt_str(&params, 0),
        cursor: opt_str(&params, 1),
        limit: opt_u64(&params, 2).map(|n| n as usize),
    };
    let handle = ctx.store.handle(ctx.namespace_id).await?;
    let entries = query::list_streams(handle.kv.as_ref(), opts)?;
    Ok(Value::Array(
        entries
            .into_iter()
            .map(|e| {
                json!({
                    "stream": e.stream,
                    "version": e.version,
                    "lastActivity": e.last_activity.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                })
            })
            .collect(),
    ))
}

async fn ns_categories(ctx: &RpcContext<'_>) -> Result<Value> {
    let handle = ctx.store.handle(ctx.namespace_id).await?;
    let entries = query::list_categories(handle.kv.as_ref())?;
    Ok(Value::Array(
        entries
            .into_iter()
            .map(|e| {
                json!({
                    "category": e.category,
                    "streamCount": e.stream_count,
                    "messageCount": e.message_count,
                })
            })
            .collect(),
    ))
}

fn sys_version() -> Value {
    json!({ "version": env!("CARGO_PKG_VERSION") })
}

fn sys_health() -> Value {
    json!({ "status": "ok", "backend": "redb" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    async fn context_with_namespace(store: &NamespaceStoreManager, bus: &Arc<PubSubBus>, id: &str) {
        store.create_namespace(id, "hash", String::new(), HashMap::new()).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let store = NamespaceStoreManager::open_in_memory().unwrap();
        let bus = PubSubBus::new();
        context_with_namespace(&store, &bus, "ns").await;
        let ctx = RpcContext { store: &store, bus: &bus, namespace_id: "ns", compress: false };
        let err = dispatch(&ctx, "nope.nope", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::MethodNotFound(_)));
    }

    #[tokio::test]
    async fn write_then_get_round_trips_through_dispatch() {
        let store = NamespaceStoreManager::open_in_memory().unwrap();
        let bus = PubSubBus::new();
        context_with_namespace(&store, &bus, "ns").await;
        let ctx = RpcContext { store: &store, bus: &bus, namespace_id: "ns", compress: false };

        let write_result = dispatch(
            &ctx,
            "stream.write",
            vec![json!("account-1"), json!("Opened"), json!({"balance": 0})],
        )
        .await
        .unwrap();
        assert_eq!(write_result["position"], json!(0));

        let rows = dispatch(&ctx, "stream.get", vec![json!("account-1")]).await.unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][2], json!("Opened"));
    }

    #[tokio::test]
    async fn stream_version_returns_negative_one_for_unknown_stream() {
        let store = NamespaceStoreManager::open_in_memory().unwrap();
        let bus = PubSubBus::new();
        context_with_namespace(&store, &bus, "ns").await;
        let ctx = RpcContext { store: &store, bus: &bus, namespace_id: "ns", compress: false };

        let version = dispatch(&ctx, "stream.version", vec![json!("account-1")]).await.unwrap();
        assert_eq!(version, json!(-1));
    }

    #[tokio::test]
    async fn ns_create_mints_a_verifiable_token() {
        let store = NamespaceStoreManager::open_in_memory().unwrap();
        let bus = PubSubBus::new();
        let ctx = RpcContext { store: &store, bus: &bus, namespace_id: "ns", compress: false };

        let created = dispatch(&ctx, "ns.create", vec![json!("tenant-a")]).await.unwrap();
        let token = created["token"].as_str().unwrap();
        assert_eq!(
            crate::api::auth::authenticate(store.registry(), token).unwrap(),
            "tenant-a"
        );
    }

    #[tokio::test]
    async fn sys_methods_need_no_namespace() {
        assert_eq!(sys_health(), json!({"status": "ok", "backend": "redb"}));
        assert!(sys_version()["version"].is_string());
    }
}
