use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single value in a stream, optionally timestamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    /// Unix timestamp in seconds. Left unset, the server stamps on arrival.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<f64>,
    pub d: Value,
    /// Device that wrote the datapoint, when the server reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub o: Option<String>,
}

impl Datapoint {
    pub fn new(d: impl Into<Value>) -> Self {
        Self {
            t: None,
            d: d.into(),
            o: None,
        }
    }

    pub fn at(t: f64, d: impl Into<Value>) -> Self {
        Self {
            t: Some(t),
            d: d.into(),
            o: None,
        }
    }

    pub fn data(&self) -> &Value {
        &self.d
    }
}

pub fn parse_datapoints(data: Value) -> Result<Vec<Datapoint>, serde_json::Error> {
    match data {
        Value::Null => Ok(Vec::new()),
        other => serde_json::from_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unstamped_datapoint_serializes_payload_only() {
        let dp = Datapoint::new(json!({"temp": 21.5}));
        assert_eq!(serde_json::to_value(&dp).unwrap(), json!({"d": {"temp": 21.5}}));
    }

    #[test]
    fn test_parse_server_datapoints() {
        let data = json!([
            {"t": 1400000000.5, "d": 1},
            {"t": 1400000001.0, "d": 2, "o": "user/phone"}
        ]);

        let points = parse_datapoints(data).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].t, Some(1400000000.5));
        assert_eq!(points[1].o.as_deref(), Some("user/phone"));
    }

    #[test]
    fn test_parse_null_is_empty() {
        assert!(parse_datapoints(Value::Null).unwrap().is_empty());
    }
}
