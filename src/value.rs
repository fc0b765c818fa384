//! Runtime values and the name→value context templates are rendered against

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Human-readable type name, used in lookup errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Member access; only maps have members, their keys
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(name),
            _ => None,
        }
    }

    /// Keyed or positional access
    ///
    /// Lists and strings take integer positions, negative ones counting from
    /// the end; maps take string keys. Indexing a string yields a fresh
    /// one-character string, everything else is borrowed.
    pub fn index(&self, key: &Value) -> Option<Cow<'_, Value>> {
        match (self, key) {
            (Value::List(items), Value::Int(i)) => {
                let i = resolve_position(*i, items.len())?;
                items.get(i).map(Cow::Borrowed)
            }
            (Value::Map(map), Value::String(key)) => map.get(key).map(Cow::Borrowed),
            (Value::String(s), Value::Int(i)) => {
                let i = resolve_position(*i, s.chars().count())?;
                s.chars()
                    .nth(i)
                    .map(|c| Cow::Owned(Value::String(c.to_string())))
            }
            _ => None,
        }
    }

    /// Source-like rendering: strings quoted, `none` spelled out
    pub fn repr(&self) -> String {
        match self {
            Value::None => "none".to_string(),
            Value::String(s) => format!("{s:?}"),
            other => other.to_string(),
        }
    }
}

fn resolve_position(i: i64, len: usize) -> Option<usize> {
    if i < 0 {
        let back = usize::try_from(i.unsigned_abs()).ok()?;
        len.checked_sub(back)
    } else {
        usize::try_from(i).ok()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            // Debug keeps the fractional part: 3.0 stays "3.0"
            Value::Float(n) => write!(f, "{n:?}"),
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&item.repr())?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key:?}: ")?;
                    f.write_str(&value.repr())?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        i64::try_from(n).map_or(Value::Float(n as f64), Value::Int)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        i64::try_from(n).map_or(Value::Float(n as f64), Value::Int)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Float(n.into())
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

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(map: BTreeMap<String, T>) -> Self {
        Value::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(map: HashMap<String, T>) -> Self {
        Value::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::None, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => items.into_iter().collect(),
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::List(iter.into_iter().map(Into::into).collect())
    }
}

/// Variables available to a single render call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context(HashMap<String, Value>);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from anything that serializes to a map, e.g. a struct
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        match Value::from(serde_json::to_value(value)?) {
            Value::Map(map) => Ok(Self(map.into_iter().collect())),
            other => Err(Error::Context(format!(
                "expected a map of variables, found {}",
                other.type_name()
            ))),
        }
    }

    /// Set a variable, returning its previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = Context::new();
        ctx.extend(iter);
        ctx
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Context {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    #[test]
    fn test_display_scalars() {
        assert_eq!(Value::None.to_string(), "");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Int(-7).to_string(), "-7");
        assert_eq!(Value::Float(3.5).to_string(), "3.5");
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::from("x").to_string(), "x");
    }

    #[test]
    fn test_display_containers() {
        let value = Value::from(json!({"b": [1, "two", null], "a": 2.5}));
        assert_eq!(value.to_string(), r#"{"a": 2.5, "b": [1, "two", none]}"#);
    }

    #[test]
    fn test_index_list() {
        let list = Value::from(vec![10, 20, 30]);
        assert_eq!(list.index(&Value::Int(1)).as_deref(), Some(&Value::Int(20)));
        assert_eq!(list.index(&Value::Int(-1)).as_deref(), Some(&Value::Int(30)));
        assert_eq!(list.index(&Value::Int(3)), None);
        assert_eq!(list.index(&Value::Int(-4)), None);
        assert_eq!(list.index(&Value::from("0")), None);
    }

    #[test]
    fn test_index_map_and_string() {
        let map = Value::from(json!({"k": "v"}));
        assert_eq!(map.index(&Value::from("k")).as_deref(), Some(&Value::from("v")));
        assert_eq!(map.index(&Value::Int(0)), None);

        let s = Value::from("héllo");
        assert_eq!(s.index(&Value::Int(1)).as_deref(), Some(&Value::from("é")));
        assert_eq!(s.index(&Value::Int(-1)).as_deref(), Some(&Value::from("o")));
        assert_eq!(Value::Int(5).index(&Value::Int(0)), None);
    }

    #[test]
    fn test_attribute() {
        let map = Value::from(json!({"b": 5}));
        assert_eq!(map.attribute("b"), Some(&Value::Int(5)));
        assert_eq!(map.attribute("c"), None);
        assert_eq!(Value::from(vec![1]).attribute("len"), None);
    }

    #[test]
    fn test_from_json_numbers() {
        assert_eq!(Value::from(json!(7)), Value::Int(7));
        assert_eq!(Value::from(json!(7.25)), Value::Float(7.25));
        assert_eq!(Value::from(json!(u64::MAX)), Value::Float(u64::MAX as f64));
    }

    #[test]
    fn test_context_from_serialize() {
        #[derive(Serialize)]
        struct Page {
            title: String,
            tags: Vec<&'static str>,
        }

        let ctx = Context::from_serialize(&Page {
            title: "Home".to_string(),
            tags: vec!["a", "b"],
        })
        .unwrap();
        assert_eq!(ctx.get("title"), Some(&Value::from("Home")));
        assert_eq!(ctx.get("tags"), Some(&Value::from(vec!["a", "b"])));
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn test_context_from_serialize_rejects_non_map() {
        let err = Context::from_serialize(&[1, 2]).unwrap_err();
        assert!(matches!(err, Error::Context(_)));
    }

    #[test]
    fn test_context_collect() {
        let mut ctx: Context = [("a", 1), ("b", 2)].into_iter().collect();
        assert!(ctx.contains("a"));
        assert_eq!(ctx.insert("a", "one"), Some(Value::Int(1)));
        ctx.extend([("c", true)]);
        let mut names: Vec<_> = ctx.names().collect();
        names.sort();
        assert_eq!(names, ["a", "b", "c"]);
    }
}
