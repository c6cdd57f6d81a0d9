use std::{
    collections::BTreeMap,
    fmt,
    str::FromStr,
    sync::{Arc, RwLock, Weak},
};

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};

use crate::function::Function;

/// Ordered map used for map values and result groups.
pub type Map = BTreeMap<MapKey, Value>;

/// Key of a [`Map`].
///
/// Integer keys sort before string keys; integers compare numerically and
/// strings lexicographically, so iteration order is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Integer(i64),
    String(String),
}

impl MapKey {
    /// Converts a subscript value into a key. Returns `None` when the value
    /// can't name a map entry (fractional numbers, bools, collections...).
    pub fn from_value(value: &Value) -> Option<MapKey> {
        match value {
            Value::Integer(n) => Some(MapKey::Integer(*n)),
            Value::String(s) => Some(MapKey::String(s.clone())),
            Value::Decimal(d) if d.fract().is_zero() => d.to_i64().map(MapKey::Integer),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(MapKey::Integer(*f as i64)),
            Value::Ref(r) => MapKey::from_value(&r.get().unwrap_or(Value::Nil)),
            _ => None,
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Integer(n) => write!(f, "{}", n),
            MapKey::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for MapKey {
    fn from(s: &str) -> Self {
        MapKey::String(s.to_string())
    }
}

impl From<String> for MapKey {
    fn from(s: String) -> Self {
        MapKey::String(s)
    }
}

impl From<i64> for MapKey {
    fn from(n: i64) -> Self {
        MapKey::Integer(n)
    }
}

/// A struct-like value: named fields in declaration order plus methods that
/// receive the record as their receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub type_name: String,
    pub fields: Vec<(String, Value)>,
    pub methods: BTreeMap<String, Function>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Record {
            type_name: type_name.into(),
            fields: Vec::new(),
            methods: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn with_method(mut self, method: Function) -> Self {
        self.methods.insert(method.name().to_string(), method);
        self
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.field_index(name).map(|i| &self.fields[i].1)
    }

    /// Looks up a method and binds this record as its receiver.
    pub fn method(&self, name: &str) -> Option<Function> {
        self.methods
            .get(name)
            .map(|m| m.bind(Value::Record(self.clone())))
    }
}

/// A shared, host-owned slot.
///
/// Reading through a reference whose slot has been dropped yields nil;
/// writing through it fails.
#[derive(Debug, Clone)]
pub struct Reference(Weak<RwLock<Value>>);

impl Reference {
    pub fn new(slot: &Arc<RwLock<Value>>) -> Self {
        Reference(Arc::downgrade(slot))
    }

    /// Current value, or `None` if the slot is gone.
    pub fn get(&self) -> Option<Value> {
        let slot = self.0.upgrade()?;
        let guard = slot.read().ok()?;
        Some(guard.clone())
    }

    /// Runs `f` against the referenced value. Returns `None` if the slot is
    /// gone.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Value) -> R) -> Option<R> {
        let slot = self.0.upgrade()?;
        let mut guard = slot.write().ok()?;
        Some(f(&mut guard))
    }

    pub fn is_stale(&self) -> bool {
        self.0.strong_count() == 0
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

/// A runtime value.
///
/// Numbers come in three shapes: `Integer` (usually from the host
/// environment), `Decimal` (exact mode literals and arithmetic) and `Float`
/// (float mode). Conversions between them are total; a value that can't be
/// converted produces the zero value of the target type.
///
/// # Examples
///
/// ```
/// use tally_lang::Value;
///
/// let v = Value::from(42);
/// assert!(v.is_number());
/// assert_eq!(v.as_string(), "42");
/// assert_eq!(Value::from("3.5").as_float(), 3.5);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    String(String),
    Time(DateTime<Utc>),
    Array(Vec<Value>),
    Map(Map),
    Record(Record),
    Function(Function),
    Ref(Reference),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self.follow_ref().as_ref(), Value::Nil)
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self.follow_ref().as_ref(),
            Value::Integer(_) | Value::Float(_) | Value::Decimal(_)
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self.follow_ref().as_ref(), Value::Float(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self.follow_ref().as_ref(), Value::String(_))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.follow_ref().as_ref(), Value::Bool(_))
    }

    pub fn is_time(&self) -> bool {
        matches!(self.follow_ref().as_ref(), Value::Time(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.follow_ref().as_ref(), Value::Function(_))
    }

    /// Follows a reference one level; any other value is returned as is.
    /// A stale reference reads as nil.
    pub fn follow(self) -> Value {
        match self {
            Value::Ref(r) => r.get().unwrap_or(Value::Nil),
            other => other,
        }
    }

    fn follow_ref(&self) -> std::borrow::Cow<'_, Value> {
        match self {
            Value::Ref(r) => std::borrow::Cow::Owned(r.get().unwrap_or(Value::Nil)),
            other => std::borrow::Cow::Borrowed(other),
        }
    }

    /// Name of the value's type, as used in error messages.
    pub fn type_name(&self) -> String {
        match self {
            Value::Nil => "nil".into(),
            Value::Bool(_) => "bool".into(),
            Value::Integer(_) => "integer".into(),
            Value::Float(_) => "float".into(),
            Value::Decimal(_) => "decimal".into(),
            Value::String(_) => "string".into(),
            Value::Time(_) => "time".into(),
            Value::Array(_) => "array".into(),
            Value::Map(_) => "map".into(),
            Value::Record(r) => r.type_name.clone(),
            Value::Function(_) => "function".into(),
            Value::Ref(r) => match r.get() {
                Some(v) => format!("ref {}", v.type_name()),
                None => "ref".into(),
            },
        }
    }

    /// Python-style truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Decimal(d) => !d.is_zero(),
            Value::String(s) => !s.is_empty(),
            Value::Time(_) => true,
            Value::Array(arr) => !arr.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Record(_) | Value::Function(_) => true,
            Value::Ref(r) => r.get().is_some_and(|v| v.is_truthy()),
        }
    }

    pub fn as_integer(&self) -> i64 {
        match self {
            Value::Integer(n) => *n,
            Value::Float(n) => *n as i64,
            Value::Decimal(d) => d.trunc().to_i64().unwrap_or_default(),
            Value::Bool(b) => i64::from(*b),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                    .unwrap_or_default()
            }
            Value::Time(t) => t.timestamp(),
            Value::Ref(r) => r.get().map(|v| v.as_integer()).unwrap_or_default(),
            _ => 0,
        }
    }

    pub fn as_float(&self) -> f64 {
        match self {
            Value::Integer(n) => *n as f64,
            Value::Float(n) => *n,
            Value::Decimal(d) => d.to_f64().unwrap_or_default(),
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::String(s) => s.trim().parse().unwrap_or_default(),
            Value::Time(t) => t.timestamp() as f64,
            Value::Ref(r) => r.get().map(|v| v.as_float()).unwrap_or_default(),
            _ => 0.0,
        }
    }

    pub fn as_decimal(&self) -> Decimal {
        match self {
            Value::Integer(n) => Decimal::from(*n),
            Value::Float(n) => Decimal::from_f64(*n).unwrap_or_default(),
            Value::Decimal(d) => *d,
            Value::Bool(b) => Decimal::from(u8::from(*b)),
            Value::String(s) => {
                let s = s.trim();
                Decimal::from_str(s)
                    .or_else(|_| Decimal::from_scientific(s))
                    .unwrap_or_default()
            }
            Value::Time(t) => Decimal::from(t.timestamp()),
            Value::Ref(r) => r.get().map(|v| v.as_decimal()).unwrap_or_default(),
            _ => Decimal::ZERO,
        }
    }

    /// String form used for concatenation and display.
    pub fn as_string(&self) -> String {
        match self {
            Value::Nil => String::new(),
            Value::Bool(true) => "True".into(),
            Value::Bool(false) => "False".into(),
            Value::Integer(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::Decimal(d) => d.normalize().to_string(),
            Value::String(s) => s.clone(),
            Value::Time(t) => t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Value::Array(items) => {
                let items: Vec<String> = items.iter().map(Value::as_string).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Map(map) => {
                let entries: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.as_string()))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
            Value::Record(r) => {
                let fields: Vec<String> = r
                    .fields
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.as_string()))
                    .collect();
                format!("{}{{{}}}", r.type_name, fields.join(", "))
            }
            Value::Function(f) => f.to_string(),
            Value::Ref(r) => r.get().map(|v| v.as_string()).unwrap_or_default(),
        }
    }

    /// Length of strings (in characters) and collections; 0 for anything
    /// else.
    pub fn len(&self) -> usize {
        match self {
            Value::String(s) => s.chars().count(),
            Value::Array(items) => items.len(),
            Value::Map(map) => map.len(),
            Value::Record(r) => r.fields.len(),
            Value::Ref(r) => r.get().map(|v| v.len()).unwrap_or_default(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Equality that looks through numeric representations: `1`, `1.0` and
    /// decimal `1.00` are all equal.
    pub fn equal_to(&self, other: &Value) -> bool {
        let (left, right) = (self.follow_ref(), other.follow_ref());
        match (left.as_ref(), right.as_ref()) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (a, b) if a.is_number() && b.is_number() => {
                if a.is_float() || b.is_float() {
                    a.as_float() == b.as_float()
                } else {
                    a.as_decimal() == b.as_decimal()
                }
            }
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equal_to(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.equal_to(other)))
            }
            (Value::Record(a), Value::Record(b)) => {
                a.type_name == b.type_name
                    && a.fields.len() == b.fields.len()
                    && a
                        .fields
                        .iter()
                        .zip(&b.fields)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.equal_to(vb))
            }
            (a, b) => a == b,
        }
    }

    /// Membership test used by the `in` operator: field presence on records,
    /// key presence on maps, substring on strings, element equality on
    /// arrays.
    pub fn contains(&self, needle: &Value) -> bool {
        match self.follow_ref().as_ref() {
            Value::Record(r) => r.field_index(&needle.as_string()).is_some(),
            Value::Map(map) => MapKey::from_value(needle).is_some_and(|k| map.contains_key(&k)),
            Value::String(s) => s.contains(&needle.as_string()),
            Value::Array(items) => items.iter().any(|item| item.equal_to(needle)),
            _ => false,
        }
    }

    /// Renders the value as JSON. Decimals become JSON numbers, times RFC
    /// 3339 strings and functions their display string.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Nil => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Integer(n) => Json::from(*n),
            Value::Float(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Decimal(d) => {
                let d = d.normalize();
                if d.scale() == 0
                    && let Some(n) = d.to_i64()
                {
                    return Json::from(n);
                }
                d.to_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Json::Number)
                    .unwrap_or(Json::Null)
            }
            Value::String(s) => Json::String(s.clone()),
            Value::Time(_) | Value::Function(_) => Json::String(self.as_string()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
            Value::Record(r) => Json::Object(
                r.fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Ref(r) => r.get().map(|v| v.to_json()).unwrap_or(Json::Null),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Time(t)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Value::Ref(r)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Nil)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Nil,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(obj) => Value::Map(
                obj.into_iter()
                    .map(|(k, v)| (MapKey::String(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}
