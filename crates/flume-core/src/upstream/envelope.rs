//! Wire shapes of the Flume API responses and their normalization.

use flume_types::{Device, DeviceKind, FlowRate, UsagePoint};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `data: [...]` payload shared by every endpoint. `success` and `message`
/// are checked on the raw body by [`declared_failure`].
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Reads `success`/`message` from a raw body. `Some(message)` when the
/// envelope declares failure.
pub(crate) fn declared_failure(body: &Value) -> Option<String> {
    if body.get("success").and_then(Value::as_bool) != Some(false) {
        return None;
    }
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or("success=false");
    Some(message.to_string())
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceWire {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(rename = "type", default)]
    kind: i64,
    #[serde(default)]
    location: Option<LocationWire>,
}

#[derive(Debug, Deserialize)]
struct LocationWire {
    #[serde(default)]
    name: Option<String>,
}

impl From<DeviceWire> for Device {
    fn from(wire: DeviceWire) -> Self {
        let location_name = wire.location.and_then(|l| l.name).unwrap_or_default();
        Device::new(wire.id, DeviceKind::from_code(wire.kind), location_name)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActiveWire {
    #[serde(default)]
    active: bool,
    #[serde(default)]
    gpm: f64,
    #[serde(default)]
    datetime: Option<String>,
}

impl From<ActiveWire> for FlowRate {
    fn from(wire: ActiveWire) -> Self {
        FlowRate::gallons_per_minute(wire.gpm, wire.active, wire.datetime)
    }
}

/// Body of `POST /me/devices/{id}/query`.
#[derive(Debug, Serialize)]
pub(crate) struct QueryRequest<'a> {
    pub queries: [UsageQuery<'a>; 1],
}

#[derive(Debug, Serialize)]
pub(crate) struct UsageQuery<'a> {
    pub request_id: &'a str,
    pub bucket: &'a str,
    pub since_datetime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until_datetime: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number id, got {other}"))),
    }
}

/// Layout of one `data[i]` entry of a usage response.
#[derive(Debug, PartialEq)]
enum UsageShape<'a> {
    /// `data[i]` is itself the point list
    Points(&'a [Value]),
    /// `data[i].<request_id>`
    ByRequestId(&'a [Value]),
    /// `data[i].query_data`
    QueryData(&'a [Value]),
    /// Any other keys holding point lists
    Keyed(Vec<&'a [Value]>),
}

impl<'a> UsageShape<'a> {
    fn classify(entry: &'a Value, request_id: &str) -> Option<Self> {
        match entry {
            Value::Array(points) => Some(Self::Points(points)),
            Value::Object(map) => {
                if let Some(Value::Array(points)) = map.get(request_id) {
                    return Some(Self::ByRequestId(points));
                }
                if let Some(Value::Array(points)) = map.get("query_data") {
                    return Some(Self::QueryData(points));
                }
                let lists: Vec<&[Value]> = map
                    .values()
                    .filter_map(|v| v.as_array().map(Vec::as_slice))
                    .collect();
                Some(Self::Keyed(lists))
            },
            _ => None,
        }
    }

    fn into_points(self) -> Result<Vec<UsagePoint>, String> {
        match self {
            Self::Points(points) | Self::ByRequestId(points) | Self::QueryData(points) => {
                points.iter().map(parse_point).collect()
            },
            Self::Keyed(lists) => {
                let mut out = Vec::new();
                for points in lists {
                    for point in points {
                        out.push(parse_point(point)?);
                    }
                }
                Ok(out)
            },
        }
    }
}

/// Accepts `{"datetime": .., "value": ..}` or `[datetime, value]`.
fn parse_point(point: &Value) -> Result<UsagePoint, String> {
    let (datetime, value) = match point {
        Value::Object(map) => (map.get("datetime"), map.get("value")),
        Value::Array(pair) if pair.len() == 2 => (pair.first(), pair.get(1)),
        other => return Err(format!("unexpected usage point: {other}")),
    };

    let datetime = datetime
        .and_then(Value::as_str)
        .ok_or_else(|| format!("usage point without datetime: {point}"))?;
    let value = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::Null) | None => 0.0,
        Some(other) => return Err(format!("usage value is not a number: {other}")),
    };
    Ok(UsagePoint::new(datetime, value))
}

/// Flattens every supported usage layout into points, in response order.
pub(crate) fn decode_usage(body: &Value, request_id: &str) -> Result<Vec<UsagePoint>, String> {
    let entries = match body.get("data") {
        Some(Value::Array(entries)) => entries,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(other) => return Err(format!("data is not an array: {other}")),
    };

    let mut points = Vec::new();
    for entry in entries {
        let shape = UsageShape::classify(entry, request_id)
            .ok_or_else(|| format!("unexpected usage entry: {entry}"))?;
        points.extend(shape.into_points()?);
    }
    Ok(points)
}
