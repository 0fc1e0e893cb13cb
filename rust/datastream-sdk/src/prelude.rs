//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use datastream_sdk::prelude::*;
//!
//! let client = DataStreamClient::connect(ClientConfig::from_env()?).await?;
//! let mut updates = client.stream("alice/phone/steps").watch(false).await?;
//! while let Some(update) = updates.next().await {
//!     // StreamExt methods available without separate import
//! }
//! ```

pub use crate::{
    ClientConfig, ConnectionConfig, DataStream, DataStreamClient, Datapoint, IndexBound,
    PushUpdate, Query, StreamError,
};

pub use futures_util::StreamExt;
