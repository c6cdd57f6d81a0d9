//! Compile-and-execute entry point.

use std::{collections::BTreeMap, sync::Arc, time::Instant};

use tracing::{debug, warn};

use crate::{
    ast::Document,
    builtins,
    context::{CancelToken, ENV_GROUP, EvalContext, Precision, ResultGroups},
    error::{Error, ErrorCodes, ErrorFormatter, ErrorKind, FormattedError},
    function::Function,
    parser::Parser,
    tags::{TagParser, TagTable},
    value::Value,
};

/// A rule plus everything needed to run it: tag table, constants,
/// functions, result groups and settings.
///
/// The compiled document is cached until a setting that affects parsing
/// changes. Private bindings declared by `set` survive between executions;
/// public bindings are replaced by each call's environment.
///
/// # Examples
///
/// ```
/// use tally_lang::{Template, Value};
///
/// let mut template = Template::new("set total = price * qty\nres.total = total");
/// let results = template
///     .execute([("price", Value::from(3)), ("qty", Value::from(4))])
///     .unwrap();
/// assert_eq!(results["res"]["total"].as_integer(), 12);
/// ```
pub struct Template {
    source: String,
    tags: TagTable,
    ctx: EvalContext,
    codes: ErrorCodes,
    document: Option<Arc<Document>>,
}

impl Template {
    /// A template with the built-in tags, constants and functions.
    pub fn new(source: impl Into<String>) -> Self {
        let mut ctx = EvalContext::new();
        if let Err(err) = builtins::install(&mut ctx) {
            warn!(%err, "built-in functions not installed");
        }
        Template {
            source: source.into(),
            tags: TagTable::default(),
            ctx,
            codes: ErrorCodes::new(),
            document: None,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn fail(&self, error: Error) -> FormattedError {
        FormattedError::new(error, self.ctx.error_formatter())
    }

    pub fn set_precision(&mut self, precision: Precision) {
        self.ctx.set_precision(precision);
    }

    pub fn precision(&self) -> Precision {
        self.ctx.precision()
    }

    /// Renames the default result group (`res`). `env` is reserved.
    pub fn set_default_result_key(&mut self, key: &str) -> Result<(), Error> {
        self.ctx.set_default_result_key(key)?;
        self.document = None;
        Ok(())
    }

    pub fn add_result_keys<I, S>(&mut self, keys: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for key in keys {
            self.ctx.add_result_key(key.as_ref())?;
        }
        Ok(())
    }

    pub fn add_function(&mut self, function: Function) -> Result<(), Error> {
        debug!(name = function.name(), "registering function");
        self.ctx.add_function(function)
    }

    pub fn add_constant(&mut self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        debug!(name, "registering constant");
        self.ctx.add_constant(name, value)
    }

    pub fn register_tag(&mut self, name: &str, parser: TagParser) -> Result<(), Error> {
        debug!(name, "registering tag");
        self.tags.register(name, parser)?;
        self.document = None;
        Ok(())
    }

    /// Host-defined error codes for functions registered on this template.
    pub fn error_codes_mut(&mut self) -> &mut ErrorCodes {
        &mut self.codes
    }

    pub fn error_codes(&self) -> &ErrorCodes {
        &self.codes
    }

    pub fn set_error_formatter(&mut self, formatter: ErrorFormatter) {
        self.ctx.set_error_formatter(formatter);
    }

    pub fn set_cancel_token(&mut self, token: Option<CancelToken>) {
        self.ctx.set_cancel_token(token);
    }

    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.ctx.set_deadline(deadline);
    }

    /// Parses the rule, or returns the cached document.
    pub fn compile(&mut self) -> Result<Arc<Document>, FormattedError> {
        if let Some(document) = &self.document {
            return Ok(Arc::clone(document));
        }
        debug!(len = self.source.len(), "compiling rule");
        let document = Parser::new(&self.source, &self.tags)
            .with_default_key(self.ctx.default_result_key())
            .parse_document()
            .map_err(|e| self.fail(e))?;
        let document = Arc::new(document);
        self.document = Some(Arc::clone(&document));
        Ok(document)
    }

    /// Runs the rule against `env` and returns the result groups.
    ///
    /// On failure no partial results are returned.
    pub fn execute<I, K>(&mut self, env: I) -> Result<ResultGroups, FormattedError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let document = self.compile()?;
        let env: Vec<(String, Value)> = env.into_iter().map(|(k, v)| (k.into(), v)).collect();
        if env.iter().any(|(k, _)| k == ENV_GROUP) {
            return Err(self.fail(ErrorKind::VariableAlreadyExists(ENV_GROUP.to_string()).into()));
        }
        self.ctx.reset(env).map_err(|e| self.fail(e))?;

        debug!("executing rule");
        document.execute(&mut self.ctx).map_err(|e| self.fail(e))?;
        let results = self.ctx.results();
        debug!(groups = results.len(), "rule finished");
        Ok(results)
    }

    /// Runs the rule with an environment given as a JSON object.
    pub fn execute_json(&mut self, env: serde_json::Value) -> Result<ResultGroups, FormattedError> {
        match env {
            serde_json::Value::Object(map) => {
                self.execute(map.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
            serde_json::Value::Null => self.execute(std::iter::empty::<(String, Value)>()),
            other => Err(self.fail(
                Error::from(ErrorKind::Internal)
                    .with_detail(format!("environment must be a JSON object, got {}", other)),
            )),
        }
    }

    /// The current public bindings, written during the last execution or
    /// not.
    pub fn public_bindings(&self) -> BTreeMap<String, Value> {
        self.ctx.public_bindings()
    }
}
