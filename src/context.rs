//! The mutable environment a compiled rule runs against.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use rust_decimal::{Decimal, prelude::FromPrimitive};
use tracing::debug;

use crate::{
    error::{Error, ErrorFormatter, ErrorKind, format_error},
    function::Function,
    value::{Map, MapKey, Value},
};

/// Name of the result group that exports written public bindings.
pub const ENV_GROUP: &str = "env";

/// Default name of the result group for bare expressions and `res.x = ...`.
pub const DEFAULT_RESULT_KEY: &str = "res";

/// Result groups returned by an execution: group name to entries.
pub type ResultGroups = BTreeMap<String, BTreeMap<String, Value>>;

/// Arithmetic mode for literals and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    /// Fixed-point decimal arithmetic
    #[default]
    Exact,
    /// 64-bit floating point
    Float,
}

impl Precision {
    /// Wraps a float in this mode's numeric representation.
    pub fn from_float(self, n: f64) -> Value {
        match self {
            Precision::Float => Value::Float(n),
            Precision::Exact => match Decimal::from_f64(n) {
                Some(d) => Value::Decimal(d),
                None => Value::Float(n),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Registered constants and functions; never writable
    Constant,
    /// Seeded from the caller's environment on every execution
    Public,
    /// Declared by `set`; survives re-execution
    Private,
    /// A result group
    Result,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub scope: Scope,
    /// Written during the current execution
    pub is_set: bool,
    pub callable: bool,
    pub value: Value,
}

impl Binding {
    pub fn new(scope: Scope, value: Value) -> Self {
        Binding {
            scope,
            is_set: false,
            callable: value.is_callable(),
            value,
        }
    }
}

/// Cooperative cancellation flag shared between the host and an execution.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Bindings plus the per-template settings evaluation needs.
///
/// One context must not be used by two executions at the same time.
#[derive(Debug, Clone)]
pub struct EvalContext {
    bindings: HashMap<String, Binding>,
    precision: Precision,
    default_result_key: String,
    result_keys: Vec<String>,
    error_formatter: ErrorFormatter,
    cancel: Option<CancelToken>,
    deadline: Option<Instant>,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl EvalContext {
    pub fn new() -> Self {
        let mut ctx = EvalContext {
            bindings: HashMap::new(),
            precision: Precision::default(),
            default_result_key: DEFAULT_RESULT_KEY.to_string(),
            result_keys: Vec::new(),
            error_formatter: format_error,
            cancel: None,
            deadline: None,
        };
        ctx.reset_result_groups();
        ctx
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn set_precision(&mut self, precision: Precision) {
        self.precision = precision;
    }

    pub fn default_result_key(&self) -> &str {
        &self.default_result_key
    }

    /// Renames the default result group. `env` is reserved and a name
    /// already bound to anything but a result group is rejected.
    pub fn set_default_result_key(&mut self, key: &str) -> Result<(), Error> {
        if key == self.default_result_key {
            return Ok(());
        }
        self.check_result_key(key)?;
        self.bindings.remove(&self.default_result_key);
        self.default_result_key = key.to_string();
        self.reset_result_groups();
        Ok(())
    }

    /// Adds extra result groups besides the default one.
    pub fn add_result_key(&mut self, key: &str) -> Result<(), Error> {
        self.check_result_key(key)?;
        self.result_keys.push(key.to_string());
        self.reset_result_groups();
        Ok(())
    }

    fn check_result_key(&self, key: &str) -> Result<(), Error> {
        if key == ENV_GROUP
            || key == self.default_result_key
            || self.result_keys.iter().any(|k| k == key)
            || self.bindings.contains_key(key)
        {
            return Err(ErrorKind::ResultKeyRegistered(key.to_string()).into());
        }
        Ok(())
    }

    pub fn error_formatter(&self) -> ErrorFormatter {
        self.error_formatter
    }

    pub fn set_error_formatter(&mut self, formatter: ErrorFormatter) {
        self.error_formatter = formatter;
    }

    pub fn set_cancel_token(&mut self, token: Option<CancelToken>) {
        self.cancel = token;
    }

    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// Fails with [`ErrorKind::Cancelled`] once the token fires or the
    /// deadline passes.
    pub fn check_cancelled(&self) -> Result<(), Error> {
        let cancelled = self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
            || self.deadline.is_some_and(|d| Instant::now() >= d);
        if cancelled {
            return Err(ErrorKind::Cancelled.into());
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn binding_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.bindings.get_mut(name)
    }

    /// Adds a binding. Names are unique across all scopes.
    pub fn define(&mut self, name: &str, binding: Binding) -> Result<(), Error> {
        if self.bindings.contains_key(name) {
            return Err(ErrorKind::VariableAlreadyExists(name.to_string()).into());
        }
        self.bindings.insert(name.to_string(), binding);
        Ok(())
    }

    pub fn add_constant(&mut self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        self.define(name, Binding::new(Scope::Constant, value.into()))
            .map_err(|_| ErrorKind::ConstantRegistered(name.to_string()).into())
    }

    pub fn add_function(&mut self, function: Function) -> Result<(), Error> {
        let name = function.name().to_string();
        self.add_constant(&name, Value::Function(function))
    }

    /// Declares or overwrites a private binding.
    pub fn set_private(&mut self, name: &str, value: Value) -> Result<(), Error> {
        match self.bindings.get_mut(name) {
            Some(binding) if binding.scope == Scope::Private => {
                binding.value = value;
                binding.is_set = true;
                Ok(())
            }
            Some(_) => Err(ErrorKind::VariableAlreadyExists(name.to_string()).into()),
            None => {
                let mut binding = Binding::new(Scope::Private, value);
                binding.is_set = true;
                self.bindings.insert(name.to_string(), binding);
                Ok(())
            }
        }
    }

    /// Stores `value` under `key` in the default result group.
    pub fn insert_result(&mut self, key: &str, value: Value) -> Result<(), Error> {
        let group = self.default_result_key.clone();
        match self.bindings.get_mut(&group).map(|b| &mut b.value) {
            Some(Value::Map(map)) => {
                map.insert(MapKey::from(key), value);
                Ok(())
            }
            _ => Err(ErrorKind::VariableInvalid(group).into()),
        }
    }

    fn reset_result_groups(&mut self) {
        let keys = std::iter::once(&self.default_result_key).chain(&self.result_keys);
        for key in keys {
            self.bindings.insert(
                key.clone(),
                Binding::new(Scope::Result, Value::Map(Map::new())),
            );
        }
    }

    /// Prepares for a new execution: result groups are emptied, public
    /// bindings replaced by `env`. Private and constant bindings stay.
    pub fn reset<I>(&mut self, env: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.bindings.retain(|_, b| b.scope != Scope::Public);
        self.reset_result_groups();
        for (name, value) in env {
            self.define(&name, Binding::new(Scope::Public, value))?;
        }
        debug!(bindings = self.bindings.len(), "context reset");
        Ok(())
    }

    /// Public bindings, written or not.
    pub fn public_bindings(&self) -> BTreeMap<String, Value> {
        self.bindings
            .iter()
            .filter(|(_, b)| b.scope == Scope::Public)
            .map(|(k, b)| (k.clone(), b.value.clone()))
            .collect()
    }

    /// Collects the result groups, plus an `env` group holding the public
    /// bindings written during this execution.
    pub fn results(&self) -> ResultGroups {
        let mut groups = ResultGroups::new();
        let keys = std::iter::once(&self.default_result_key).chain(&self.result_keys);
        for key in keys {
            let entries = match self.bindings.get(key).map(|b| &b.value) {
                Some(Value::Map(map)) => map
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                _ => BTreeMap::new(),
            };
            groups.insert(key.clone(), entries);
        }

        let written: BTreeMap<String, Value> = self
            .bindings
            .iter()
            .filter(|(_, b)| b.scope == Scope::Public && b.is_set)
            .map(|(k, b)| (k.clone(), b.value.clone()))
            .collect();
        if !written.is_empty() {
            groups.insert(ENV_GROUP.to_string(), written);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_replaces_public_bindings() {
        let mut ctx = EvalContext::new();
        ctx.reset([("a".to_string(), Value::from(1))]).unwrap();
        ctx.set_private("p", Value::from(2)).unwrap();
        ctx.reset([("b".to_string(), Value::from(3))]).unwrap();

        assert!(ctx.lookup("a").is_none());
        assert_eq!(ctx.lookup("b").map(|b| b.scope), Some(Scope::Public));
        assert_eq!(ctx.lookup("p").map(|b| &b.value), Some(&Value::from(2)));
    }

    #[test]
    fn test_env_name_collision() {
        let mut ctx = EvalContext::new();
        ctx.add_constant("pi", Value::from(3)).unwrap();
        let err = ctx.reset([("pi".to_string(), Value::Nil)]).unwrap_err();
        assert_eq!(err.code(), -519);
    }

    #[test]
    fn test_result_key_rules() {
        let mut ctx = EvalContext::new();
        assert_eq!(ctx.add_result_key("env").unwrap_err().code(), -524);
        ctx.add_result_key("out").unwrap();
        assert_eq!(ctx.add_result_key("out").unwrap_err().code(), -524);
        assert!(ctx.results().contains_key("out"));
    }

    #[test]
    fn test_cancel_token() {
        let mut ctx = EvalContext::new();
        let token = CancelToken::new();
        ctx.set_cancel_token(Some(token.clone()));
        assert!(ctx.check_cancelled().is_ok());
        token.cancel();
        assert_eq!(ctx.check_cancelled().unwrap_err().code(), -528);
    }
}
