use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::HttpTransport;
use crate::push::{ConnectionState, PushClient};
use crate::stream::DataStream;
use crate::transport::Transport;
use std::sync::Arc;

/// Entry point: one HTTP transport and, optionally, one push connection
/// shared by every stream handed out.
#[derive(Clone)]
pub struct DataStreamClient {
    transport: Arc<dyn Transport>,
    push: Option<PushClient>,
}

impl DataStreamClient {
    /// Builds the transports described by `config`. The push connection is
    /// opened in the background; inserts use HTTP until it is up.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let mut http = HttpTransport::new(&config)?;

        let push = config.push_url.as_ref().map(|url| {
            PushClient::connect(url.clone(), config.api_key.clone(), config.connection.clone())
        });
        if let Some(push) = &push {
            http = http.with_push(Arc::new(push.clone()));
        }

        tracing::info!(
            "DataStream client for {} (push: {})",
            http.base_url(),
            push.as_ref().map(|p| p.url()).unwrap_or("disabled")
        );

        Ok(Self {
            transport: Arc::new(http),
            push,
        })
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            push: None,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// A stream handle without fetched metadata.
    pub fn stream(&self, name: impl Into<String>) -> DataStream {
        DataStream::new(name, self.transport.clone())
    }

    /// A stream handle with its metadata loaded from the server.
    pub async fn open_stream(&self, name: impl Into<String>) -> Result<DataStream> {
        let mut stream = self.stream(name);
        stream.refresh().await?;
        Ok(stream)
    }

    pub async fn push_state(&self) -> Option<ConnectionState> {
        match &self.push {
            Some(push) => Some(push.state().await),
            None => None,
        }
    }

    pub async fn disconnect(&self) {
        if let Some(push) = &self.push {
            push.disconnect().await;
        }
    }
}
