//! Access to a single stream: metadata, inserts, range reads and live updates.
//!
//! ```rust,ignore
//! let mut steps = client.stream("alice/phone/steps");
//! steps.create(&json!({"type": "integer"})).await?;
//!
//! steps.insert(120).await?;
//! let latest = steps.get(-1).await?;
//! let first_ten = steps.slice(Some(0), Some(10)).await?;
//!
//! steps.subscribe(|update| println!("{:?}", update.data), false).await?;
//! ```

use crate::datapoint::{parse_datapoints, Datapoint};
use crate::error::{Result, StreamError};
use crate::object::ObjectMetadata;
use crate::query::Query;
use crate::subscription::{channel_name, PushUpdate};
use crate::transport::Transport;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Live updates of a watched stream.
pub type UpdateStream = UnboundedReceiverStream<PushUpdate>;

/// A named, schema-typed, append-only time series on the server.
///
/// Reads take `&self`. Anything that changes the cached metadata takes
/// `&mut self`, so concurrent metadata writers must go through their own
/// synchronization.
#[derive(Clone)]
pub struct DataStream {
    meta: ObjectMetadata,
}

impl fmt::Debug for DataStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStream")
            .field("name", &self.name())
            .field("metadata", self.meta.data())
            .finish()
    }
}

impl DataStream {
    /// Binds to `name` (`user/device/stream`) without contacting the server.
    pub fn new(name: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            meta: ObjectMetadata::new(name, transport),
        }
    }

    pub fn name(&self) -> &str {
        self.meta.path()
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        self.meta.data()
    }

    fn transport(&self) -> &Arc<dyn Transport> {
        self.meta.transport()
    }

    fn data_path(&self) -> String {
        format!("{}/data", self.name())
    }

    pub async fn refresh(&mut self) -> Result<()> {
        self.meta.refresh().await
    }

    /// Creates the stream with the given JSON Schema for its datapoints.
    ///
    /// The schema document itself is checked against JSON Schema draft 4
    /// before anything is sent.
    pub async fn create(&mut self, schema: &Value) -> Result<()> {
        validate_schema(schema)?;
        tracing::debug!("Creating stream {}", self.name());
        let document = self.transport().post(self.name(), schema).await?;
        self.meta.replace(document)
    }

    pub fn nickname(&self) -> Option<&str> {
        self.meta.field("nickname").and_then(Value::as_str)
    }

    pub async fn set_nickname(&mut self, nickname: impl Into<String>) -> Result<()> {
        self.meta.set(json!({ "nickname": nickname.into() })).await
    }

    pub fn downlink(&self) -> bool {
        self.flag("downlink")
    }

    pub async fn set_downlink(&mut self, downlink: bool) -> Result<()> {
        self.meta.set(json!({ "downlink": downlink })).await
    }

    pub fn ephemeral(&self) -> bool {
        self.flag("ephemeral")
    }

    pub async fn set_ephemeral(&mut self, ephemeral: bool) -> Result<()> {
        self.meta.set(json!({ "ephemeral": ephemeral })).await
    }

    // The server reports unset flags as null.
    fn flag(&self, name: &str) -> bool {
        self.meta
            .field(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// The stream's JSON Schema, parsed from the cached metadata on every call.
    pub fn schema(&self) -> Result<Value> {
        match self.meta.field("schema") {
            Some(Value::String(raw)) => Ok(serde_json::from_str(raw)?),
            Some(Value::Object(schema)) => Ok(Value::Object(schema.clone())),
            _ => Err(StreamError::UnexpectedResponse(format!(
                "stream {} has no schema in its metadata",
                self.name()
            ))),
        }
    }

    /// Number of datapoints currently in the stream. Always asks the server.
    pub async fn length(&self) -> Result<u64> {
        let response = self
            .transport()
            .get(&self.data_path(), &[("q", "length".to_string())])
            .await?;
        parse_count(&response)
    }

    /// Index of the first datapoint with a timestamp at or after `t`.
    pub async fn time_to_index(&self, t: f64) -> Result<u64> {
        let response = self
            .transport()
            .get(
                &self.data_path(),
                &[("q", "time2index".to_string()), ("t", t.to_string())],
            )
            .await?;
        parse_count(&response)
    }

    /// Inserts `points`, over the push connection when enabled.
    ///
    /// A rejected push insert falls back to a single HTTP write: `PUT` when
    /// `restamp` is set (the server may re-stamp out-of-order timestamps),
    /// `POST` otherwise. HTTP failures are not retried.
    pub async fn insert_many(&self, points: &[Datapoint], restamp: bool) -> Result<()> {
        let transport = self.transport();

        if transport.push_insert_enabled() {
            if let Some(push) = transport.push() {
                if push.insert(self.name(), points).await {
                    return Ok(());
                }
                tracing::warn!(
                    "Push insert of {} datapoints into {} failed, falling back to HTTP",
                    points.len(),
                    self.name()
                );
            }
        }

        let body = serde_json::to_value(points)?;
        if restamp {
            transport.put(&self.data_path(), &body).await?;
        } else {
            transport.post(&self.data_path(), &body).await?;
        }
        Ok(())
    }

    /// Inserts a single value stamped by the server.
    ///
    /// Always goes through the restamping write; use
    /// [`insert_many`](Self::insert_many) for appends.
    pub async fn insert(&self, value: impl Into<Value>) -> Result<()> {
        self.insert_many(&[Datapoint::new(value)], true).await
    }

    pub async fn query(&self, query: &Query) -> Result<Vec<Datapoint>> {
        let response = self
            .transport()
            .get(&self.data_path(), &query.to_params())
            .await?;
        Ok(parse_datapoints(response)?)
    }

    /// The datapoint at `index`. Negative indices count back from the newest
    /// datapoint, so `get(-1)` is the latest one.
    pub async fn get(&self, index: i64) -> Result<Datapoint> {
        let next = index
            .checked_add(1)
            .ok_or(StreamError::EmptyResult { index })?;
        self.query(&Query::index(index, next))
            .await?
            .into_iter()
            .next()
            .ok_or(StreamError::EmptyResult { index })
    }

    /// Datapoints in `[start, stop)`. Both bounds default to 0, and the
    /// server treats a stop of 0 as the end of the stream. Use
    /// [`slice_to_end`](Self::slice_to_end) to say so explicitly.
    pub async fn slice(&self, start: Option<i64>, stop: Option<i64>) -> Result<Vec<Datapoint>> {
        self.query(&Query::index(start.unwrap_or(0), stop.unwrap_or(0)))
            .await
    }

    pub async fn slice_to_end(&self, start: i64) -> Result<Vec<Datapoint>> {
        self.query(&Query::index_from(start)).await
    }

    /// Registers `callback` for datapoints pushed on this stream, or on its
    /// downlink channel.
    pub async fn subscribe<F>(&self, callback: F, downlink: bool) -> Result<()>
    where
        F: Fn(&PushUpdate) + Send + Sync + 'static,
    {
        let push = self.transport().push().ok_or(StreamError::PushUnavailable)?;
        push.subscribe(&channel_name(self.name(), downlink), Arc::new(callback))
            .await
    }

    pub async fn unsubscribe(&self, downlink: bool) -> Result<()> {
        let push = self.transport().push().ok_or(StreamError::PushUnavailable)?;
        push.unsubscribe(&channel_name(self.name(), downlink)).await
    }

    /// Like [`subscribe`](Self::subscribe), but yields updates as a stream.
    /// The subscription stays active until [`unsubscribe`](Self::unsubscribe).
    pub async fn watch(&self, downlink: bool) -> Result<UpdateStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe(
            move |update: &PushUpdate| {
                let _ = tx.send(update.clone());
            },
            downlink,
        )
        .await?;
        Ok(UnboundedReceiverStream::new(rx))
    }
}

fn validate_schema(schema: &Value) -> Result<()> {
    if !schema.is_object() {
        return Err(StreamError::Schema(format!(
            "schema must be a JSON object, got {}",
            schema
        )));
    }
    jsonschema::draft4::new(schema)
        .map(|_| ())
        .map_err(|e| StreamError::Schema(e.to_string()))
}

fn parse_count(response: &Value) -> Result<u64> {
    let count = match response {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    count.ok_or_else(|| StreamError::UnexpectedResponse(format!("expected a count, got {}", response)))
}
