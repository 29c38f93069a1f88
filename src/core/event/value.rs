// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde_json::Value as JsonValue;

/// Shared key/value payload, also the shape of a slice snapshot.
pub type EventMap = HashMap<EventValue, EventValue>;

/// Dynamically typed event payload flowing through processor ports.
///
/// `List` and `Map` are reference counted so that fanning one event out to many
/// ports (or handing the same slice snapshot to several consumers) never deep
/// copies the payload.
///
/// Values double as slice keys, so `EventValue` is `Eq + Hash`: floating point
/// numbers compare by bit pattern and a `Map` hashes only its length, which is
/// consistent with map equality.
#[derive(Debug, Clone, Default)]
pub enum EventValue {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    List(Arc<Vec<EventValue>>),
    Map(Arc<EventMap>),
    /// Slicing sentinel: dispatch the event to every live slice.
    ToAllSlices,
}

impl EventValue {
    pub fn list(values: Vec<EventValue>) -> Self {
        EventValue::List(Arc::new(values))
    }

    pub fn map(entries: EventMap) -> Self {
        EventValue::Map(Arc::new(entries))
    }

    /// Build a map with string keys, the common shape of a structured event.
    pub fn record<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<EventValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let entries = fields
            .into_iter()
            .map(|(k, v)| (EventValue::String(k.into()), v.into()))
            .collect();
        EventValue::Map(Arc::new(entries))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, EventValue::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            EventValue::Null => "null",
            EventValue::Bool(_) => "bool",
            EventValue::Int(_) => "int",
            EventValue::Long(_) => "long",
            EventValue::Float(_) => "float",
            EventValue::Double(_) => "double",
            EventValue::String(_) => "string",
            EventValue::List(_) => "list",
            EventValue::Map(_) => "map",
            EventValue::ToAllSlices => "to-all-slices",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EventValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            EventValue::Int(v) => Some(*v as i64),
            EventValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EventValue::Int(v) => Some(*v as f64),
            EventValue::Long(v) => Some(*v as f64),
            EventValue::Float(v) => Some(*v as f64),
            EventValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EventValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[EventValue]> {
        match self {
            EventValue::List(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&EventMap> {
        match self {
            EventValue::Map(entries) => Some(entries.as_ref()),
            _ => None,
        }
    }

    /// Look up a string-keyed field; `Null` when absent or when `self` is not a map.
    pub fn get_field(&self, name: &str) -> EventValue {
        self.as_map()
            .and_then(|m| m.get(&EventValue::String(name.to_string())))
            .cloned()
            .unwrap_or(EventValue::Null)
    }

    /// Render as JSON. Map keys that are not strings are rendered with `Display`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            EventValue::Null => JsonValue::Null,
            EventValue::Bool(b) => JsonValue::Bool(*b),
            EventValue::Int(v) => JsonValue::from(*v),
            EventValue::Long(v) => JsonValue::from(*v),
            EventValue::Float(v) => JsonValue::from(*v as f64),
            EventValue::Double(v) => JsonValue::from(*v),
            EventValue::String(s) => JsonValue::String(s.clone()),
            EventValue::List(values) => {
                JsonValue::Array(values.iter().map(EventValue::to_json).collect())
            }
            EventValue::Map(entries) => {
                let object = entries
                    .iter()
                    .map(|(k, v)| {
                        let key = match k {
                            EventValue::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (key, v.to_json())
                    })
                    .collect();
                JsonValue::Object(object)
            }
            EventValue::ToAllSlices => JsonValue::String("*".to_string()),
        }
    }
}

impl PartialEq for EventValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (EventValue::Null, EventValue::Null) => true,
            (EventValue::ToAllSlices, EventValue::ToAllSlices) => true,
            (EventValue::Bool(a), EventValue::Bool(b)) => a == b,
            (EventValue::Int(a), EventValue::Int(b)) => a == b,
            (EventValue::Long(a), EventValue::Long(b)) => a == b,
            (EventValue::Float(a), EventValue::Float(b)) => a.to_bits() == b.to_bits(),
            (EventValue::Double(a), EventValue::Double(b)) => a.to_bits() == b.to_bits(),
            (EventValue::String(a), EventValue::String(b)) => a == b,
            (EventValue::List(a), EventValue::List(b)) => a == b,
            (EventValue::Map(a), EventValue::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for EventValue {}

impl Hash for EventValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            EventValue::Null | EventValue::ToAllSlices => {}
            EventValue::Bool(b) => b.hash(state),
            EventValue::Int(v) => v.hash(state),
            EventValue::Long(v) => v.hash(state),
            EventValue::Float(v) => v.to_bits().hash(state),
            EventValue::Double(v) => v.to_bits().hash(state),
            EventValue::String(s) => s.hash(state),
            EventValue::List(values) => values.hash(state),
            // Entry order is unspecified; the length is the only order-free part.
            EventValue::Map(entries) => entries.len().hash(state),
        }
    }
}

impl fmt::Display for EventValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventValue::Null => write!(f, "null"),
            EventValue::Bool(b) => write!(f, "{b}"),
            EventValue::Int(v) => write!(f, "{v}"),
            EventValue::Long(v) => write!(f, "{v}"),
            EventValue::Float(v) => write!(f, "{v}"),
            EventValue::Double(v) => write!(f, "{v}"),
            EventValue::String(s) => write!(f, "{s}"),
            EventValue::ToAllSlices => write!(f, "*"),
            EventValue::List(_) | EventValue::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<bool> for EventValue {
    fn from(v: bool) -> Self {
        EventValue::Bool(v)
    }
}

impl From<i32> for EventValue {
    fn from(v: i32) -> Self {
        EventValue::Int(v)
    }
}

impl From<i64> for EventValue {
    fn from(v: i64) -> Self {
        EventValue::Long(v)
    }
}

impl From<f32> for EventValue {
    fn from(v: f32) -> Self {
        EventValue::Float(v)
    }
}

impl From<f64> for EventValue {
    fn from(v: f64) -> Self {
        EventValue::Double(v)
    }
}

impl From<&str> for EventValue {
    fn from(v: &str) -> Self {
        EventValue::String(v.to_string())
    }
}

impl From<String> for EventValue {
    fn from(v: String) -> Self {
        EventValue::String(v)
    }
}

impl From<Vec<EventValue>> for EventValue {
    fn from(v: Vec<EventValue>) -> Self {
        EventValue::list(v)
    }
}

impl From<JsonValue> for EventValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => EventValue::Null,
            JsonValue::Bool(b) => EventValue::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    EventValue::Long(i)
                } else {
                    EventValue::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => EventValue::String(s),
            JsonValue::Array(values) => {
                EventValue::list(values.into_iter().map(EventValue::from).collect())
            }
            JsonValue::Object(object) => EventValue::record(object),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_json_object_becomes_record() {
        let event = EventValue::from(json!({"owner": "A", "amount": 3}));
        assert_eq!(event.get_field("owner"), EventValue::from("A"));
        assert_eq!(event.get_field("amount"), EventValue::Long(3));
        assert!(event.get_field("missing").is_null());
    }

    #[test]
    fn test_values_work_as_keys() {
        let mut keys = HashSet::new();
        keys.insert(EventValue::from("A"));
        keys.insert(EventValue::Double(f64::NAN));
        keys.insert(EventValue::record([("x", 1)]));

        assert!(keys.contains(&EventValue::from("A")));
        assert!(keys.contains(&EventValue::Double(f64::NAN)));
        assert!(keys.contains(&EventValue::record([("x", 1)])));
        assert!(!keys.contains(&EventValue::record([("x", 2)])));
    }

    #[test]
    fn test_int_and_long_are_distinct_keys() {
        assert_ne!(EventValue::Int(1), EventValue::Long(1));
        assert_eq!(EventValue::Int(1).as_i64(), EventValue::Long(1).as_i64());
    }

    #[test]
    fn test_to_json_renders_non_string_keys() {
        let mut entries = EventMap::new();
        entries.insert(EventValue::Int(7), EventValue::Bool(true));
        let json = EventValue::map(entries).to_json();
        assert_eq!(json, json!({"7": true}));
    }
}
