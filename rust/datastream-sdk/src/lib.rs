//! # datastream-sdk
//!
//! Rust client SDK for DataStream servers.
//!
//! A stream is a named, schema-typed, append-only time series
//! (`user/device/stream`). This crate lets you create and describe streams,
//! insert datapoints, read them back by index or timestamp, and subscribe to
//! live updates over a WebSocket push connection.
//!
//! ## Example
//!
//! ```rust,ignore
//! use datastream_sdk::prelude::*;
//!
//! let config = ClientConfig::new("http://localhost:8000/api/v1")
//!     .with_push_url("ws://localhost:8000/api/v1/websocket")
//!     .with_api_key(api_key)
//!     .with_push_insert(true);
//! let client = DataStreamClient::connect(config).await?;
//!
//! let temps = client.open_stream("alice/thermostat/temperature").await?;
//! temps.insert_many(&[Datapoint::new(21.5)], false).await?;
//!
//! let today = temps.query(&Query::time(Some(midnight), None, None)).await?;
//!
//! let mut updates = temps.watch(false).await?;
//! while let Some(update) = updates.next().await {
//!     println!("{:?}", update.data);
//! }
//! ```
//!
//! ## Transports
//!
//! - **HTTP** - every read, metadata change and the durable insert path
//! - **Push** - subscriptions, plus best-effort inserts when `push_insert` is on

mod client;
mod config;
mod datapoint;
mod error;
mod http;
mod object;
mod push;
mod query;
mod stream;
mod subscription;
mod transport;

pub mod prelude;

pub use client::DataStreamClient;
pub use config::{ClientConfig, ConnectionConfig};
pub use datapoint::Datapoint;
pub use error::{Result, StreamError};
pub use http::HttpTransport;
pub use object::ObjectMetadata;
pub use push::{ConnectionState, PushClient, PushConnection};
pub use query::{IndexBound, Query, QueryBuilder, QueryParams, Range};
pub use stream::{DataStream, UpdateStream};
pub use subscription::{channel_name, ClientMessage, PushUpdate, SubscriptionCallback};
pub use transport::Transport;

pub use serde_json::Value;
