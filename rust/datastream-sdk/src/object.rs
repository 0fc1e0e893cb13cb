use crate::error::{Result, StreamError};
use crate::transport::Transport;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A named object on the server together with its last-fetched metadata.
///
/// Mutations go straight to the server and the cache is replaced with what
/// the server answers; there is no local-only edit.
#[derive(Clone)]
pub struct ObjectMetadata {
    path: String,
    transport: Arc<dyn Transport>,
    data: Map<String, Value>,
}

impl ObjectMetadata {
    pub fn new(path: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            path: path.into(),
            transport,
            data: Map::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Replaces the cache with a metadata document returned by the server.
    pub fn replace(&mut self, document: Value) -> Result<()> {
        match document {
            Value::Object(map) => {
                self.data = map;
                Ok(())
            }
            other => Err(StreamError::UnexpectedResponse(format!(
                "expected metadata object for {}, got {}",
                self.path, other
            ))),
        }
    }

    pub async fn refresh(&mut self) -> Result<()> {
        let document = self.transport.get(&self.path, &[]).await?;
        self.replace(document)
    }

    /// Persists `partial` and refreshes the cache from the response.
    pub async fn set(&mut self, partial: Value) -> Result<()> {
        tracing::debug!("Updating metadata of {}: {}", self.path, partial);
        let document = self.transport.put(&self.path, &partial).await?;
        self.replace(document)
    }
}
