//! Dynamic values carried by futures.
//!
//! Futures settle with a [`Value`]. Collections handed to the aggregator are
//! `Value::List`s whose items may be plain values or other futures, and
//! callbacks are `Value::Function`s so that callability can be checked at the
//! API boundary the same way any other type mismatch is.

use super::FutureId;
use crate::errors::PromiseError;
use crate::runtime::Runtime;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

/// Signature of a native callable: runtime, receiver, arguments.
///
/// `Err` is a thrown value.
pub type NativeFn = dyn Fn(&Runtime, &Value, &[Value]) -> Result<Value, Value>;

/// A reference-counted callable value.
#[derive(Clone)]
pub struct Function {
    name: Option<String>,
    inner: Rc<NativeFn>,
}

impl Function {
    /// Creates an anonymous function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Runtime, &Value, &[Value]) -> Result<Value, Value> + 'static,
    {
        Self {
            name: None,
            inner: Rc::new(f),
        }
    }

    /// Creates a named function. The name shows up in traces and logs.
    pub fn named<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Runtime, &Value, &[Value]) -> Result<Value, Value> + 'static,
    {
        Self {
            name: Some(name.into()),
            inner: Rc::new(f),
        }
    }

    /// Returns the function name, or `<anonymous>`.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    /// Calls the function.
    ///
    /// A panic inside the callable is caught and surfaces as a thrown
    /// [`PromiseError::Error`].
    pub fn call(&self, rt: &Runtime, receiver: &Value, args: &[Value]) -> Result<Value, Value> {
        match catch_unwind(AssertUnwindSafe(|| (self.inner)(rt, receiver, args))) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic payload".to_string());
                Err(PromiseError::error(format!("{} panicked: {message}", self.name())).into())
            }
        }
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name())
    }
}

/// A dynamically typed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Undefined,
    /// Explicit null.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string.
    String(String),
    /// An ordered collection.
    List(Vec<Value>),
    /// A string-keyed map.
    Object(BTreeMap<String, Value>),
    /// A future owned by the runtime.
    Future(FutureId),
    /// A callable.
    Function(Function),
    /// An error value.
    Error(PromiseError),
}

impl Value {
    /// Wraps a closure into a function value.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Runtime, &Value, &[Value]) -> Result<Value, Value> + 'static,
    {
        Self::Function(Function::new(f))
    }

    /// Returns the name of this value's type as used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "array",
            Self::Object(_) => "object",
            Self::Future(_) => "future",
            Self::Function(_) => "function",
            Self::Error(_) => "error",
        }
    }

    /// Returns the future handle if this is a future.
    #[must_use]
    pub fn as_future(&self) -> Option<FutureId> {
        match self {
            Self::Future(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the function if this is callable.
    #[must_use]
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Returns the items if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the error if this is an error value.
    #[must_use]
    pub fn as_error(&self) -> Option<&PromiseError> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true if the value is callable.
    #[must_use]
    pub fn is_function(&self) -> bool {
        matches!(self, Self::Function(_))
    }

    /// Renders the value as JSON for logs and event payloads.
    ///
    /// Futures and functions have no JSON form and are rendered as strings.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Undefined | Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Self::Future(id) => serde_json::Value::String(id.to_string()),
            Self::Function(f) => serde_json::Value::String(format!("[function {}]", f.name())),
            Self::Error(e) => serde_json::json!({ "name": e.name(), "message": e.message() }),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Error(e) => write!(f, "{e}"),
            Self::Future(id) => write!(f, "{id}"),
            Self::Function(func) => write!(f, "[function {}]", func.name()),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<FutureId> for Value {
    fn from(id: FutureId) -> Self {
        Self::Future(id)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Self::Function(f)
    }
}

impl From<PromiseError> for Value {
    fn from(e: PromiseError) -> Self {
        Self::Error(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Undefined.type_name(), "undefined");
        assert_eq!(Value::from(1).type_name(), "number");
        assert_eq!(Value::from("x").type_name(), "string");
        assert_eq!(Value::from(vec![1, 2]).type_name(), "array");
        assert_eq!(Value::Future(FutureId(0)).type_name(), "future");
        assert_eq!(Value::function(|_, _, _| Ok(Value::Null)).type_name(), "function");
    }

    #[test]
    fn test_from_json() {
        let value = Value::from(serde_json::json!({"a": [1, "two", null]}));
        let mut expected = BTreeMap::new();
        expected.insert(
            "a".to_string(),
            Value::List(vec![Value::Number(1.0), Value::from("two"), Value::Null]),
        );
        assert_eq!(value, Value::Object(expected));
    }

    #[test]
    fn test_to_json_integral_numbers() {
        assert_eq!(Value::from(vec![1, 2, 3]).to_json(), serde_json::json!([1, 2, 3]));
        assert_eq!(Value::from(1.5).to_json(), serde_json::json!(1.5));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("x").to_string(), "\"x\"");
        assert_eq!(Value::Undefined.to_string(), "undefined");
        assert_eq!(
            Value::from(PromiseError::error("boom")).to_string(),
            "Error: boom"
        );
    }

    #[test]
    fn test_function_identity() {
        let f = Function::new(|_, _, _| Ok(Value::Null));
        let g = Function::new(|_, _, _| Ok(Value::Null));
        assert_eq!(f, f.clone());
        assert_ne!(f, g);
        assert_eq!(f.name(), "<anonymous>");
        assert_eq!(Function::named("load", |_, _, _| Ok(Value::Null)).name(), "load");
    }
}
