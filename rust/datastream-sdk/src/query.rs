//! Range queries against a stream's datapoints.
//!
//! A stream can be read by index (`[i1, i2)`, zero-based from the oldest
//! retained datapoint) or by timestamp (`[t1, t2]` with an optional `limit`),
//! never both at once. [`Query`] makes the addressing mode explicit;
//! [`QueryBuilder`] accepts the flat set of optional arguments and rejects
//! mixed addressing before anything is sent.
//!
//! ```rust,ignore
//! let last_ten = stream.query(&Query::index_from(-10)).await?;
//!
//! let hourly = Query::builder()
//!     .t1(start)
//!     .t2(end)
//!     .transform("$['temp']")
//!     .build()?;
//! let temps = stream.query(&hourly).await?;
//! ```

use crate::error::{Result, StreamError};

pub type QueryParams = Vec<(&'static str, String)>;

/// Upper bound of an index range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBound {
    /// Exclusive index. The server reads `0` as "up to the newest datapoint".
    At(i64),
    /// Everything through the newest datapoint; no `i2` goes on the wire.
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Range {
    /// The whole stream, starting from index 0.
    FromStart,
    ByIndex {
        i1: i64,
        i2: IndexBound,
    },
    ByTime {
        t1: Option<f64>,
        t2: Option<f64>,
        limit: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub range: Range,
    /// Server-side expression applied to each datapoint before it is returned.
    pub transform: Option<String>,
}

impl Default for Query {
    fn default() -> Self {
        Self::all()
    }
}

impl Query {
    pub fn all() -> Self {
        Self {
            range: Range::FromStart,
            transform: None,
        }
    }

    /// Datapoints in `[i1, i2)`.
    pub fn index(i1: i64, i2: i64) -> Self {
        Self {
            range: Range::ByIndex {
                i1,
                i2: IndexBound::At(i2),
            },
            transform: None,
        }
    }

    /// Datapoints from `i1` through the newest one.
    pub fn index_from(i1: i64) -> Self {
        Self {
            range: Range::ByIndex {
                i1,
                i2: IndexBound::End,
            },
            transform: None,
        }
    }

    pub fn time(t1: Option<f64>, t2: Option<f64>, limit: Option<u64>) -> Self {
        Self {
            range: Range::ByTime { t1, t2, limit },
            transform: None,
        }
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    pub fn with_transform(mut self, transform: impl Into<String>) -> Self {
        self.transform = Some(transform.into());
        self
    }

    /// Query-string parameters for `<stream>/data`.
    pub fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new();

        match &self.range {
            Range::FromStart => {}
            Range::ByIndex { i1, i2 } => {
                params.push(("i1", i1.to_string()));
                if let IndexBound::At(i2) = i2 {
                    params.push(("i2", i2.to_string()));
                }
            }
            Range::ByTime { t1, t2, limit } => {
                if let Some(t1) = t1 {
                    params.push(("t1", t1.to_string()));
                }
                if let Some(t2) = t2 {
                    params.push(("t2", t2.to_string()));
                }
                if let Some(limit) = limit {
                    params.push(("limit", limit.to_string()));
                }
            }
        }

        // The server rejects an empty range query.
        if params.is_empty() {
            params.push(("i1", "0".to_string()));
        }

        if let Some(transform) = &self.transform {
            params.push(("transform", transform.clone()));
        }

        params
    }
}

/// Flat form of a query where every argument is optional.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    t1: Option<f64>,
    t2: Option<f64>,
    limit: Option<u64>,
    i1: Option<i64>,
    i2: Option<i64>,
    transform: Option<String>,
}

impl QueryBuilder {
    pub fn t1(mut self, t1: f64) -> Self {
        self.t1 = Some(t1);
        self
    }

    pub fn t2(mut self, t2: f64) -> Self {
        self.t2 = Some(t2);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn i1(mut self, i1: i64) -> Self {
        self.i1 = Some(i1);
        self
    }

    pub fn i2(mut self, i2: i64) -> Self {
        self.i2 = Some(i2);
        self
    }

    pub fn transform(mut self, transform: impl Into<String>) -> Self {
        self.transform = Some(transform.into());
        self
    }

    /// Fails with [`StreamError::AddressingConflict`] when an index bound is
    /// combined with `t1`, `t2` or `limit`.
    pub fn build(self) -> Result<Query> {
        let by_index = self.i1.is_some() || self.i2.is_some();
        let by_time = self.t1.is_some() || self.t2.is_some() || self.limit.is_some();

        let range = match (by_index, by_time) {
            (true, true) => return Err(StreamError::AddressingConflict),
            (true, false) => Range::ByIndex {
                i1: self.i1.unwrap_or(0),
                i2: self.i2.map(IndexBound::At).unwrap_or(IndexBound::End),
            },
            (false, true) => Range::ByTime {
                t1: self.t1,
                t2: self.t2,
                limit: self.limit,
            },
            (false, false) => Range::FromStart,
        };

        Ok(Query {
            range,
            transform: self.transform,
        })
    }
}

impl TryFrom<QueryBuilder> for Query {
    type Error = StreamError;

    fn try_from(builder: QueryBuilder) -> Result<Self> {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected(pairs: &[(&'static str, &str)]) -> QueryParams {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_empty_query_reads_from_start() {
        let query = Query::builder().build().unwrap();
        assert_eq!(query.range, Range::FromStart);
        assert_eq!(query.to_params(), expected(&[("i1", "0")]));
    }

    #[test]
    fn test_index_range() {
        let query = Query::index(2, 9);
        assert_eq!(query.to_params(), expected(&[("i1", "2"), ("i2", "9")]));
    }

    #[test]
    fn test_index_to_end_omits_upper_bound() {
        let query = Query::index_from(5);
        assert_eq!(query.to_params(), expected(&[("i1", "5")]));
    }

    #[test]
    fn test_time_range_with_limit() {
        let query = Query::builder().t1(100.5).t2(200.0).limit(10).build().unwrap();
        assert_eq!(
            query.to_params(),
            expected(&[("t1", "100.5"), ("t2", "200"), ("limit", "10")]),
        );
    }

    #[test]
    fn test_limit_alone_is_a_time_query() {
        let query = Query::builder().limit(3).build().unwrap();
        assert_eq!(
            query.range,
            Range::ByTime {
                t1: None,
                t2: None,
                limit: Some(3)
            }
        );
        assert_eq!(query.to_params(), expected(&[("limit", "3")]));
    }

    #[test]
    fn test_mixed_addressing_is_rejected() {
        let err = Query::builder().t1(1.0).i1(0).build().unwrap_err();
        assert!(matches!(err, StreamError::AddressingConflict));

        let err = Query::builder().limit(5).i2(3).build().unwrap_err();
        assert!(matches!(err, StreamError::AddressingConflict));
    }

    #[test]
    fn test_i2_without_i1_starts_at_zero() {
        let query = Query::builder().i2(4).build().unwrap();
        assert_eq!(query.to_params(), expected(&[("i1", "0"), ("i2", "4")]));
    }

    #[test]
    fn test_i1_without_i2_reads_to_end() {
        let query = Query::builder().i1(7).build().unwrap();
        assert_eq!(query.to_params(), expected(&[("i1", "7")]));
    }

    #[test]
    fn test_transform_applies_in_every_mode() {
        let query = Query::all().with_transform("$ > 5");
        assert_eq!(query.to_params(), expected(&[("i1", "0"), ("transform", "$ > 5")]));

        let query = Query::builder().t1(1.0).transform("$").build().unwrap();
        assert_eq!(query.to_params(), expected(&[("t1", "1"), ("transform", "$")]));
    }

    #[test]
    fn test_empty_time_range_falls_back_to_start() {
        let query = Query::time(None, None, None);
        assert_eq!(query.to_params(), expected(&[("i1", "0")]));
    }
}
