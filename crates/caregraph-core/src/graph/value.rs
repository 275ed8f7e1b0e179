//! Graph values as returned by the database, and their normalization
//!
//! The Neo4j Query API encodes every value as `{"$type": ..., "_value": ...}`.
//! Temporal types are decoded into chrono values so callers never see the
//! wire encoding; `normalize` turns everything back into plain JSON with
//! temporal values rendered as ISO-8601 strings.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Map, Number, Value};

const LOCAL_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// A node returned by a query
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub element_id: String,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, GraphValue>,
}

/// A relationship returned by a query
#[derive(Debug, Clone, PartialEq)]
pub struct GraphRelationship {
    pub element_id: String,
    pub rel_type: String,
    pub properties: BTreeMap<String, GraphValue>,
}

/// A database-native value
#[derive(Debug, Clone, PartialEq)]
pub enum GraphValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime, FixedOffset),
    LocalTime(NaiveTime),
    DateTime(DateTime<FixedOffset>),
    ZonedDateTime(DateTime<FixedOffset>, String),
    LocalDateTime(NaiveDateTime),
    /// ISO-8601 duration text, e.g. `P14DT16H12M`
    Duration(String),
    List(Vec<GraphValue>),
    Map(BTreeMap<String, GraphValue>),
    Node(GraphNode),
    Relationship(GraphRelationship),
    Path(Vec<GraphValue>),
    /// Anything the decoder does not model (points, future types)
    Other(Value),
}

impl GraphValue {
    /// Decode a typed JSON value (`{"$type": ..., "_value": ...}`)
    ///
    /// Untyped JSON is accepted as well and mapped structurally.
    pub fn from_typed_json(value: &Value) -> Self {
        let Some((kind, inner)) = typed_parts(value) else {
            return Self::from_plain_json(value);
        };

        match kind {
            "Null" => Self::Null,
            "Boolean" => inner
                .as_bool()
                .map(Self::Boolean)
                .unwrap_or_else(|| Self::Other(value.clone())),
            "Integer" => parse_number::<i64>(inner)
                .map(Self::Integer)
                .unwrap_or_else(|| Self::Other(value.clone())),
            "Float" => parse_number::<f64>(inner)
                .map(Self::Float)
                .unwrap_or_else(|| Self::Other(value.clone())),
            "String" | "Base64" | "Point" => match inner.as_str() {
                Some(s) => Self::String(s.to_string()),
                None => Self::Other(value.clone()),
            },
            "Date" => decode_temporal(inner, |s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Self::Date)
            }),
            "Time" => decode_temporal(inner, parse_offset_time),
            "LocalTime" => decode_temporal(inner, |s| {
                NaiveTime::parse_from_str(s, TIME_FORMAT)
                    .ok()
                    .map(Self::LocalTime)
            }),
            "DateTime" | "OffsetDateTime" | "ZonedDateTime" => {
                decode_temporal(inner, parse_zoned_datetime)
            }
            "LocalDateTime" => decode_temporal(inner, |s| {
                NaiveDateTime::parse_from_str(s, LOCAL_DATETIME_FORMAT)
                    .ok()
                    .map(Self::LocalDateTime)
            }),
            "Duration" => match inner.as_str() {
                Some(s) => Self::Duration(s.to_string()),
                None => Self::Other(value.clone()),
            },
            "List" => match inner.as_array() {
                Some(items) => Self::List(items.iter().map(Self::from_typed_json).collect()),
                None => Self::Other(value.clone()),
            },
            "Path" => match inner.as_array() {
                Some(items) => Self::Path(items.iter().map(Self::from_typed_json).collect()),
                None => Self::Other(value.clone()),
            },
            "Map" => match inner.as_object() {
                Some(map) => Self::Map(decode_properties(map)),
                None => Self::Other(value.clone()),
            },
            "Node" => decode_node(inner).unwrap_or_else(|| Self::Other(value.clone())),
            "Relationship" => {
                decode_relationship(inner).unwrap_or_else(|| Self::Other(value.clone()))
            }
            _ => Self::Other(value.clone()),
        }
    }

    /// Map untyped JSON onto graph values
    pub fn from_plain_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Null),
            },
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from_typed_json).collect()),
            Value::Object(map) => Self::Map(decode_properties(map)),
        }
    }

    /// Whether this value is a date/time type
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            Self::Date(_)
                | Self::Time(..)
                | Self::LocalTime(_)
                | Self::DateTime(_)
                | Self::ZonedDateTime(..)
                | Self::LocalDateTime(_)
                | Self::Duration(_)
        )
    }

    /// Convert into plain JSON, rendering temporal values as ISO-8601 strings
    ///
    /// Nodes and relationships collapse to their property maps.
    pub fn normalize(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Boolean(b) => Value::Bool(*b),
            Self::Integer(i) => Value::Number((*i).into()),
            Self::Float(f) => Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(f.to_string())),
            Self::String(s) => Value::String(s.clone()),
            Self::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Self::Time(t, offset) => Value::String(format!("{}{}", t.format(TIME_FORMAT), offset)),
            Self::LocalTime(t) => Value::String(t.format(TIME_FORMAT).to_string()),
            Self::DateTime(dt) | Self::ZonedDateTime(dt, _) => Value::String(dt.to_rfc3339()),
            Self::LocalDateTime(dt) => Value::String(dt.format(LOCAL_DATETIME_FORMAT).to_string()),
            Self::Duration(d) => Value::String(d.clone()),
            Self::List(items) | Self::Path(items) => {
                Value::Array(items.iter().map(Self::normalize).collect())
            }
            Self::Map(map) => normalize_properties(map),
            Self::Node(node) => normalize_properties(&node.properties),
            Self::Relationship(rel) => normalize_properties(&rel.properties),
            Self::Other(raw) => raw.clone(),
        }
    }

    /// Borrow the string payload, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow list items, if any
    pub fn as_list(&self) -> Option<&[GraphValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for GraphValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for GraphValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for GraphValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for GraphValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for GraphValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<NaiveDate> for GraphValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveDateTime> for GraphValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::LocalDateTime(value)
    }
}

impl From<DateTime<FixedOffset>> for GraphValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::DateTime(value)
    }
}

impl<T: Into<GraphValue>> From<Vec<T>> for GraphValue {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

fn typed_parts(value: &Value) -> Option<(&str, &Value)> {
    let obj = value.as_object()?;
    let kind = obj.get("$type")?.as_str()?;
    Some((kind, obj.get("_value").unwrap_or(&Value::Null)))
}

/// Integers and floats arrive as strings to preserve precision
fn parse_number<T: std::str::FromStr>(value: &Value) -> Option<T> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

/// Decode a temporal string, keeping the raw text when it does not parse
fn decode_temporal<F>(value: &Value, parse: F) -> GraphValue
where
    F: Fn(&str) -> Option<GraphValue>,
{
    match value.as_str() {
        Some(s) => parse(s).unwrap_or_else(|| GraphValue::String(s.to_string())),
        None => GraphValue::Other(value.clone()),
    }
}

fn parse_offset_time(s: &str) -> Option<GraphValue> {
    let split = s.find(['+', '-', 'Z'])?;
    let (time, offset) = s.split_at(split);
    let time = NaiveTime::parse_from_str(time, TIME_FORMAT).ok()?;
    let offset = DateTime::parse_from_rfc3339(&format!("2000-01-01T00:00:00{}", offset))
        .ok()?
        .offset()
        .to_owned();
    Some(GraphValue::Time(time, offset))
}

fn parse_zoned_datetime(s: &str) -> Option<GraphValue> {
    match s.split_once('[') {
        Some((datetime, zone)) => {
            let datetime = DateTime::parse_from_rfc3339(datetime).ok()?;
            Some(GraphValue::ZonedDateTime(
                datetime,
                zone.trim_end_matches(']').to_string(),
            ))
        }
        None => DateTime::parse_from_rfc3339(s).ok().map(GraphValue::DateTime),
    }
}

fn decode_properties(map: &Map<String, Value>) -> BTreeMap<String, GraphValue> {
    map.iter()
        .map(|(k, v)| (k.clone(), GraphValue::from_typed_json(v)))
        .collect()
}

fn decode_node(value: &Value) -> Option<GraphValue> {
    let obj = value.as_object()?;
    let labels = obj
        .get("_labels")?
        .as_array()?
        .iter()
        .filter_map(|l| l.as_str().map(str::to_string))
        .collect();
    let properties = obj
        .get("_properties")
        .and_then(Value::as_object)
        .map(decode_properties)
        .unwrap_or_default();

    Some(GraphValue::Node(GraphNode {
        element_id: element_id(obj),
        labels,
        properties,
    }))
}

fn decode_relationship(value: &Value) -> Option<GraphValue> {
    let obj = value.as_object()?;
    let rel_type = obj.get("_type")?.as_str()?.to_string();
    let properties = obj
        .get("_properties")
        .and_then(Value::as_object)
        .map(decode_properties)
        .unwrap_or_default();

    Some(GraphValue::Relationship(GraphRelationship {
        element_id: element_id(obj),
        rel_type,
        properties,
    }))
}

fn element_id(obj: &Map<String, Value>) -> String {
    obj.get("_element_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn normalize_properties(map: &BTreeMap<String, GraphValue>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), v.normalize()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn typed(kind: &str, value: Value) -> Value {
        json!({"$type": kind, "_value": value})
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(GraphValue::from_typed_json(&typed("Null", Value::Null)), GraphValue::Null);
        assert_eq!(
            GraphValue::from_typed_json(&typed("Integer", json!("42"))),
            GraphValue::Integer(42)
        );
        assert_eq!(
            GraphValue::from_typed_json(&typed("Float", json!("1.5"))),
            GraphValue::Float(1.5)
        );
        assert_eq!(
            GraphValue::from_typed_json(&typed("String", json!("Aspirin"))),
            GraphValue::from("Aspirin")
        );
        assert_eq!(
            GraphValue::from_typed_json(&typed("Boolean", json!(true))),
            GraphValue::Boolean(true)
        );
    }

    #[test]
    fn test_date_normalizes_to_iso_string() {
        let value = GraphValue::from_typed_json(&typed("Date", json!("2024-03-15")));
        assert!(matches!(value, GraphValue::Date(_)));
        assert!(value.is_temporal());
        assert_eq!(value.normalize(), json!("2024-03-15"));
    }

    #[test]
    fn test_native_temporal_values_normalize_to_strings() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 9).unwrap();
        assert_eq!(GraphValue::from(date).normalize(), json!("2023-01-09"));

        let local = date.and_hms_opt(8, 30, 0).unwrap();
        assert_eq!(GraphValue::from(local).normalize(), json!("2023-01-09T08:30:00"));

        let dt = DateTime::parse_from_rfc3339("2023-01-09T08:30:00+02:00").unwrap();
        assert_eq!(GraphValue::from(dt).normalize(), json!("2023-01-09T08:30:00+02:00"));
    }

    #[test]
    fn test_decode_datetimes() {
        let zoned = GraphValue::from_typed_json(&typed(
            "ZonedDateTime",
            json!("2015-11-21T21:40:32.142+01:00[Europe/Stockholm]"),
        ));
        match &zoned {
            GraphValue::ZonedDateTime(_, zone) => assert_eq!(zone, "Europe/Stockholm"),
            other => panic!("unexpected value: {:?}", other),
        }
        assert_eq!(zoned.normalize(), json!("2015-11-21T21:40:32.142+01:00"));

        let local = GraphValue::from_typed_json(&typed("LocalDateTime", json!("2015-07-04T19:32:24")));
        assert_eq!(local.normalize(), json!("2015-07-04T19:32:24"));

        let time = GraphValue::from_typed_json(&typed("Time", json!("12:50:35.556+01:00")));
        assert!(matches!(time, GraphValue::Time(..)));
        assert_eq!(time.normalize(), json!("12:50:35.556+01:00"));

        let duration = GraphValue::from_typed_json(&typed("Duration", json!("P14DT16H12M")));
        assert_eq!(duration.normalize(), json!("P14DT16H12M"));
    }

    #[test]
    fn test_unparseable_temporal_keeps_raw_text() {
        let value = GraphValue::from_typed_json(&typed("Date", json!("+999999999-12-31")));
        assert_eq!(value, GraphValue::from("+999999999-12-31"));
    }

    #[test]
    fn test_node_normalizes_to_properties() {
        let node = typed(
            "Node",
            json!({
                "_element_id": "4:abc:1",
                "_labels": ["Patient"],
                "_properties": {
                    "name": {"$type": "String", "_value": "John Doe"},
                    "date_of_admission": {"$type": "Date", "_value": "2024-01-31"}
                }
            }),
        );
        let value = GraphValue::from_typed_json(&node);
        match &value {
            GraphValue::Node(n) => assert_eq!(n.labels, vec!["Patient".to_string()]),
            other => panic!("unexpected value: {:?}", other),
        }
        assert_eq!(
            value.normalize(),
            json!({"name": "John Doe", "date_of_admission": "2024-01-31"})
        );
    }

    #[test]
    fn test_list_and_map_are_recursive() {
        let list = typed(
            "List",
            json!([{"$type": "Date", "_value": "2020-02-29"}, {"$type": "Integer", "_value": "7"}]),
        );
        assert_eq!(GraphValue::from_typed_json(&list).normalize(), json!(["2020-02-29", 7]));

        let map = typed("Map", json!({"since": {"$type": "LocalTime", "_value": "09:15:00"}}));
        assert_eq!(GraphValue::from_typed_json(&map).normalize(), json!({"since": "09:15:00"}));
    }

    #[test]
    fn test_untyped_json_passes_through() {
        let value = GraphValue::from_typed_json(&json!({"name": "Ward 3", "beds": 12}));
        assert_eq!(value.normalize(), json!({"name": "Ward 3", "beds": 12}));
    }

    #[test]
    fn test_non_finite_float_becomes_string() {
        assert_eq!(GraphValue::Float(f64::NAN).normalize(), json!("NaN"));
    }
}
