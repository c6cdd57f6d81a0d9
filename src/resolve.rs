//! Variable paths: reading (`resolve`), writing (`assign`) and calls.
//!
//! Both directions walk the path with [`select`], which maps a container and
//! one field or subscript to a [`Slot`]. Reading follows the slot to a value;
//! writing keeps the container and stores into the slot in place.

use std::borrow::Cow;

use tracing::trace;

use crate::{
    ast::{Expr, Part, PartKind, VariablePath},
    context::{EvalContext, Scope},
    error::{Error, ErrorKind, Position},
    value::{Map, MapKey, Value},
};

/// One evaluated path step.
#[derive(Debug, Clone)]
enum Selector<'p> {
    Name(&'p str),
    Index(Value),
}

impl Selector<'_> {
    fn as_name(&self) -> Cow<'_, str> {
        match self {
            Selector::Name(name) => Cow::Borrowed(name),
            Selector::Index(value) => Cow::Owned(value.as_string()),
        }
    }
}

/// Where a selector lands inside a container.
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Field(usize),
    Key(MapKey),
    Index(usize),
    Char(usize),
}

fn bounds_check(index: &Value, len: usize, path: &str) -> Result<usize, Error> {
    let i = index.as_integer();
    if i < 0 || i as usize >= len {
        return Err(ErrorKind::ArgumentOutOfBounds {
            path: path.to_string(),
            len,
            index: i,
        }
        .into());
    }
    Ok(i as usize)
}

/// Locates `selector` in `container`. `Ok(None)` means the step reads as
/// nil: a missing record field, an index that can't be a map key, or a nil
/// container.
fn select(container: &Value, selector: &Selector<'_>, path: &str) -> Result<Option<Slot>, Error> {
    match (container, selector) {
        (Value::Nil, _) => Ok(None),
        (Value::Record(record), _) => Ok(record.field_index(&selector.as_name()).map(Slot::Field)),
        (Value::Map(_), Selector::Name(name)) => Ok(Some(Slot::Key(MapKey::from(*name)))),
        (Value::Map(_), Selector::Index(index)) => Ok(MapKey::from_value(index).map(Slot::Key)),
        (Value::Array(items), Selector::Index(index)) => {
            bounds_check(index, items.len(), path).map(|i| Some(Slot::Index(i)))
        }
        (Value::String(s), Selector::Index(index)) => {
            bounds_check(index, s.chars().count(), path).map(|i| Some(Slot::Char(i)))
        }
        (other, _) => Err(ErrorKind::VariableNotAccess {
            type_name: other.type_name(),
            path: path.to_string(),
        }
        .into()),
    }
}

/// Reads the value at `slot`; `None` for a missing map key.
fn read_slot<'v>(container: &'v Value, slot: &Slot) -> Option<Cow<'v, Value>> {
    match (container, slot) {
        (Value::Record(record), Slot::Field(i)) => record.fields.get(*i).map(|(_, v)| Cow::Borrowed(v)),
        (Value::Map(map), Slot::Key(key)) => map.get(key).map(Cow::Borrowed),
        (Value::Array(items), Slot::Index(i)) => items.get(*i).map(Cow::Borrowed),
        (Value::String(s), Slot::Char(i)) => s
            .chars()
            .nth(*i)
            .map(|c| Cow::Owned(Value::String(c.to_string()))),
        _ => None,
    }
}

fn step<'v>(current: Cow<'v, Value>, selector: &Selector<'_>, path: &str) -> Result<Option<Cow<'v, Value>>, Error> {
    match current {
        Cow::Borrowed(value) => {
            let Some(slot) = select(value, selector, path)? else {
                return Ok(None);
            };
            Ok(read_slot(value, &slot))
        }
        Cow::Owned(value) => {
            let Some(slot) = select(&value, selector, path)? else {
                return Ok(None);
            };
            Ok(read_slot(&value, &slot).map(|v| Cow::Owned(v.into_owned())))
        }
    }
}

/// Text of the path up to and including `parts[..=upto]`, for messages.
fn prefix(path: &VariablePath, upto: usize) -> String {
    VariablePath {
        parts: path.parts[..=upto].to_vec(),
    }
    .to_string()
}

/// Reads the value a path names.
///
/// Missing fields and keys make the whole path nil. Method lookup on a
/// record takes precedence over its fields.
pub fn resolve(path: &VariablePath, ctx: &EvalContext) -> Result<Value, Error> {
    let root = path.root();
    let binding = ctx
        .lookup(root)
        .ok_or_else(|| Error::from(ErrorKind::VariableInvalid(root.to_string())).at(path.position()))?;

    let mut current: Cow<'_, Value> = Cow::Borrowed(&binding.value);
    for (i, part) in path.parts.iter().enumerate().skip(1) {
        if let PartKind::Call(args) = &part.kind {
            let value = call(current.as_ref(), args, &prefix(path, i - 1), path.position(), ctx)?;
            current = Cow::Owned(value);
            continue;
        }

        if let Value::Ref(r) = current.as_ref() {
            current = Cow::Owned(r.get().unwrap_or(Value::Nil));
        }

        let selector = match &part.kind {
            PartKind::Ident(name) => {
                if let Value::Record(record) = current.as_ref()
                    && let Some(method) = record.method(name)
                {
                    current = Cow::Owned(Value::Function(method));
                    continue;
                }
                Selector::Name(name)
            }
            PartKind::Subscript(index) => Selector::Index(index.evaluate(ctx)?.follow()),
            PartKind::Call(_) => unreachable!("calls are handled above"),
        };

        let text = prefix(path, i);
        match step(current, &selector, &text).map_err(|e| e.or_at(part.pos))? {
            Some(next) => current = next,
            None => return Ok(Value::Nil),
        }
    }
    Ok(current.into_owned())
}

/// Invokes `callee` with the evaluated `args`.
///
/// An error the function attributes to one argument is reported at that
/// argument; anything else at the call site.
fn call(callee: &Value, args: &[Expr], name: &str, call_site: Position, ctx: &EvalContext) -> Result<Value, Error> {
    let function = match callee.clone().follow() {
        Value::Function(f) => f,
        _ => {
            return Err(Error::from(ErrorKind::VariableNotFunction(name.to_string())).at(call_site));
        }
    };

    let values = args
        .iter()
        .map(|a| a.evaluate(ctx))
        .collect::<Result<Vec<_>, _>>()?;

    trace!(function = function.name(), args = values.len(), "calling function");
    function.call(ctx, values).map_err(|e| {
        match e.argument().and_then(|i| args.get(i)) {
            Some(arg) => {
                let pos = arg.position();
                e.at(pos)
            }
            None => e.or_at(call_site),
        }
    })
}

fn cannot_set(path: &str) -> Error {
    ErrorKind::VariableCannotSetValue(path.to_string()).into()
}

/// Converts `value` to the type currently held by a record field.
fn coerce_like(current: &Value, value: Value) -> Value {
    match current {
        Value::Integer(_) => Value::Integer(value.as_integer()),
        Value::Float(_) => Value::Float(value.as_float()),
        Value::Decimal(_) => Value::Decimal(value.as_decimal()),
        Value::String(_) => Value::String(value.as_string()),
        Value::Bool(_) => Value::Bool(value.is_truthy()),
        _ => value,
    }
}

/// Writes `value` at `selectors` below `target`. With `vivify`, missing
/// intermediate map entries and nil containers become empty maps.
fn store(target: &mut Value, selectors: &[Selector<'_>], value: Value, vivify: bool, path: &str) -> Result<(), Error> {
    let Some((first, rest)) = selectors.split_first() else {
        *target = value;
        return Ok(());
    };

    if let Value::Ref(r) = target {
        let r = r.clone();
        return r
            .with_mut(|inner| store(inner, selectors, value, vivify, path))
            .unwrap_or_else(|| Err(cannot_set(path)));
    }

    if target.is_nil() {
        if !vivify {
            return Err(ErrorKind::VariableInvalid(path.to_string()).into());
        }
        *target = Value::Map(Map::new());
    }

    let slot = select(target, first, path)?
        .ok_or_else(|| Error::from(ErrorKind::VariableInvalid(path.to_string())))?;

    match (target, slot) {
        (Value::Record(record), Slot::Field(i)) => {
            let field = &mut record.fields[i].1;
            if rest.is_empty() {
                *field = coerce_like(field, value);
                Ok(())
            } else {
                store(field, rest, value, vivify, path)
            }
        }
        (Value::Map(map), Slot::Key(key)) => {
            if rest.is_empty() {
                map.insert(key, value);
                return Ok(());
            }
            let child = match map.entry(key) {
                std::collections::btree_map::Entry::Occupied(entry) => entry.into_mut(),
                std::collections::btree_map::Entry::Vacant(entry) => {
                    if !vivify {
                        return Err(ErrorKind::VariableInvalid(path.to_string()).into());
                    }
                    entry.insert(Value::Map(Map::new()))
                }
            };
            store(child, rest, value, vivify, path)
        }
        (Value::Array(items), Slot::Index(i)) => store(&mut items[i], rest, value, vivify, path),
        _ => Err(cannot_set(path)),
    }
}

/// Evaluates `value` and writes it to `target`.
///
/// Only declared roots are writable. Result groups create missing
/// intermediate maps; other roots need the full path to exist. Errors from
/// the right-hand side are reported at the right-hand side.
pub fn assign(target: &VariablePath, value: &Expr, ctx: &mut EvalContext) -> Result<(), Error> {
    let text = target.to_string();
    if let Some(part) = target.parts.iter().find(|p| matches!(p.kind, PartKind::Call(_))) {
        return Err(Error::from(ErrorKind::VariableCannotFunction(text)).at(part.pos));
    }

    let root = target.root();
    let scope = match ctx.lookup(root) {
        Some(binding) => binding.scope,
        None => return Err(Error::from(ErrorKind::AssignObject(root.to_string())).at(target.position())),
    };
    if scope == Scope::Constant {
        return Err(cannot_set(&text).at(target.position()));
    }

    let selectors = target.parts[1..]
        .iter()
        .map(|part: &Part| match &part.kind {
            PartKind::Ident(name) => Ok(Selector::Name(name)),
            PartKind::Subscript(index) => index.evaluate(ctx).map(|v| Selector::Index(v.follow())),
            PartKind::Call(_) => unreachable!("rejected above"),
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let value = value
        .evaluate(ctx)
        .map_err(|e| e.at(value.position()))?;

    if selectors.is_empty() && scope == Scope::Result {
        return Err(cannot_set(&text).at(target.position()));
    }

    let Some(binding) = ctx.binding_mut(root) else {
        return Err(Error::from(ErrorKind::AssignObject(root.to_string())).at(target.position()));
    };
    store(&mut binding.value, &selectors, value, scope == Scope::Result, &text)
        .map_err(|e| e.or_at(target.position()))?;
    binding.is_set = true;
    Ok(())
}
