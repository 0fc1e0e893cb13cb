use crate::error::Result;
use crate::push::PushConnection;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Request/response access to the DataStream REST API plus the optional
/// push connection shared by every stream of a client.
///
/// Paths are relative to the API root (`user/device/stream`,
/// `user/device/stream/data`). Non-2xx answers surface as
/// [`StreamError::Transport`](crate::StreamError::Transport).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str, params: &[(&'static str, String)]) -> Result<Value>;

    async fn post(&self, path: &str, body: &Value) -> Result<Value>;

    async fn put(&self, path: &str, body: &Value) -> Result<Value>;

    /// Whether inserts should be tried over the push connection first.
    fn push_insert_enabled(&self) -> bool;

    fn push(&self) -> Option<Arc<dyn PushConnection>>;
}
