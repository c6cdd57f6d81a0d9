//! Host callables and their signature descriptors.
//!
//! A registered function is a closure plus a [`Signature`] describing its
//! parameters. Arity and argument types are checked against the descriptor
//! before the closure runs.

use std::{fmt, sync::Arc};

use crate::{
    context::{EvalContext, Precision},
    error::{Error, ErrorKind},
    value::Value,
};

/// Expected type of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Any,
    Number,
    String,
    Bool,
    Time,
    Array,
    Map,
    Function,
}

impl ParamType {
    /// Whether `value` may be passed for this parameter. Nil always passes.
    pub fn accepts(self, value: &Value) -> bool {
        let value = value.clone().follow();
        match (self, &value) {
            (_, Value::Nil) | (ParamType::Any, _) => true,
            (ParamType::Number, v) => v.is_number(),
            (ParamType::String, Value::String(_)) => true,
            (ParamType::Bool, Value::Bool(_)) => true,
            (ParamType::Time, Value::Time(_)) => true,
            (ParamType::Array, Value::Array(_)) => true,
            (ParamType::Map, Value::Map(_) | Value::Record(_)) => true,
            (ParamType::Function, Value::Function(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Any => "any",
            ParamType::Number => "number",
            ParamType::String => "string",
            ParamType::Bool => "bool",
            ParamType::Time => "time",
            ParamType::Array => "array",
            ParamType::Map => "map",
            ParamType::Function => "function",
        };
        write!(f, "{}", name)
    }
}

/// Parameter descriptor of a callable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    pub params: Vec<ParamType>,
    pub variadic: Option<ParamType>,
    /// The evaluation context is handed to the function through
    /// [`Args::context`]; it does not count as an argument.
    pub takes_context: bool,
    /// The function may report an error besides its value.
    pub fallible: bool,
}

impl Signature {
    pub fn new(params: impl Into<Vec<ParamType>>) -> Self {
        Signature {
            params: params.into(),
            ..Default::default()
        }
    }

    /// `n` parameters of any type.
    pub fn any(n: usize) -> Self {
        Signature::new(vec![ParamType::Any; n])
    }

    pub fn variadic(mut self, tail: ParamType) -> Self {
        self.variadic = Some(tail);
        self
    }

    pub fn with_context(mut self) -> Self {
        self.takes_context = true;
        self
    }

    fn check_arity(&self, function: &str, got: usize) -> Result<(), Error> {
        let fixed = self.params.len();
        let ok = match self.variadic {
            Some(_) => got >= fixed,
            None => got == fixed,
        };
        if ok {
            return Ok(());
        }
        let expected = match self.variadic {
            Some(_) => format!(">={}", fixed),
            None => format!("={}", fixed),
        };
        Err(ErrorKind::ArgumentCount {
            function: function.to_string(),
            expected,
            got,
        }
        .into())
    }

    fn check_types(&self, function: &str, values: &[Value]) -> Result<(), Error> {
        for (index, value) in values.iter().enumerate() {
            match self.params.get(index) {
                Some(expected) if !expected.accepts(value) => {
                    return Err(Error::from(ErrorKind::ArgumentInputType {
                        function: function.to_string(),
                        index,
                        expected: expected.to_string(),
                        actual: value.type_name(),
                    })
                    .at_argument(index));
                }
                Some(_) => {}
                None => {
                    if let Some(tail) = self.variadic
                        && !tail.accepts(value)
                    {
                        return Err(Error::from(ErrorKind::ArgumentVariadicInputType {
                            function: function.to_string(),
                            index,
                            expected: tail.to_string(),
                            actual: value.type_name(),
                        })
                        .at_argument(index));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Arguments handed to a function body.
pub struct Args<'a> {
    /// Present only when the signature asks for it.
    pub context: Option<&'a EvalContext>,
    /// The bound record, for methods.
    pub receiver: Option<&'a Value>,
    pub precision: Precision,
    pub values: Vec<Value>,
}

impl Args<'_> {
    /// The `index`-th argument, or nil past the end.
    pub fn get(&self, index: usize) -> &Value {
        static NIL: Value = Value::Nil;
        self.values.get(index).unwrap_or(&NIL)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Wraps a float result in the active precision.
    pub fn number(&self, n: f64) -> Value {
        self.precision.from_float(n)
    }
}

type Body = dyn Fn(Args<'_>) -> Result<Value, Error> + Send + Sync;

/// A callable value.
#[derive(Clone)]
pub struct Function {
    name: String,
    signature: Signature,
    body: Arc<Body>,
    receiver: Option<Box<Value>>,
}

impl Function {
    /// A function that always produces a value.
    pub fn new<F>(name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(Args<'_>) -> Value + Send + Sync + 'static,
    {
        Function {
            name: name.into(),
            signature: Signature {
                fallible: false,
                ..signature
            },
            body: Arc::new(move |args| Ok(body(args))),
            receiver: None,
        }
    }

    /// A function that returns a value or an error.
    ///
    /// An error marked with [`Error::at_argument`] is reported at that
    /// argument's position in the rule source.
    pub fn fallible<F>(name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(Args<'_>) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Function {
            name: name.into(),
            signature: Signature {
                fallible: true,
                ..signature
            },
            body: Arc::new(body),
            receiver: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Returns a copy bound to `receiver`.
    pub fn bind(&self, receiver: Value) -> Function {
        Function {
            receiver: Some(Box::new(receiver)),
            ..self.clone()
        }
    }

    /// Checks arity and argument types, then runs the body.
    pub fn call(&self, ctx: &EvalContext, values: Vec<Value>) -> Result<Value, Error> {
        self.signature.check_arity(&self.name, values.len())?;
        self.signature.check_types(&self.name, &values)?;

        (self.body)(Args {
            context: self.signature.takes_context.then_some(ctx),
            receiver: self.receiver.as_deref(),
            precision: ctx.precision(),
            values,
        })
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut params: Vec<String> = self.signature.params.iter().map(|p| p.to_string()).collect();
        if let Some(tail) = self.signature.variadic {
            params.push(format!("{}...", tail));
        }
        write!(f, "fn {}({})", self.name, params.join(", "))
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.body, &other.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add() -> Function {
        Function::new("add", Signature::new([ParamType::Number, ParamType::Number]), |args| {
            Value::from(args.get(0).as_integer() + args.get(1).as_integer())
        })
    }

    #[test]
    fn test_arity_message() {
        let ctx = EvalContext::new();
        let err = add().call(&ctx, vec![Value::from(1)]).unwrap_err();
        assert_eq!(err.code(), -501);
        assert_eq!(
            err.message(),
            "function 'add' requires =2 arguments, but got 1"
        );

        let variadic = Function::new("sum", Signature::any(2).variadic(ParamType::Any), |_| Value::Nil);
        let err = variadic.call(&ctx, vec![Value::from(1)]).unwrap_err();
        assert_eq!(
            err.message(),
            "function 'sum' requires >=2 arguments, but got 1"
        );
    }

    #[test]
    fn test_type_check_marks_argument() {
        let ctx = EvalContext::new();
        let err = add()
            .call(&ctx, vec![Value::from(1), Value::from("x")])
            .unwrap_err();
        assert_eq!(err.code(), -504);
        assert_eq!(err.argument(), Some(1));
    }

    #[test]
    fn test_nil_passes_type_check() {
        let ctx = EvalContext::new();
        let result = add().call(&ctx, vec![Value::Nil, Value::from(2)]).unwrap();
        assert_eq!(result, Value::from(2));
    }
}
