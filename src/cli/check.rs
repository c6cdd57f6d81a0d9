//! Compile and run a rule against a JSON environment

use tracing::debug;

use super::CliError;
use crate::{
    context::{Precision, ResultGroups},
    template::Template,
};

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The rule source
    pub rule: String,
    /// Environment as a JSON object
    pub env: Option<String>,
    /// Use float arithmetic instead of exact decimals
    pub float: bool,
    /// Name of the default result group
    pub result_key: Option<String>,
    /// Only validate syntax, don't execute
    pub syntax_only: bool,
}

/// Result of a check operation
#[derive(Debug)]
pub enum CheckResult {
    /// Syntax validation passed
    SyntaxValid,
    /// Rule executed successfully
    Success(ResultGroups),
}

/// Execute a tally check operation
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    let mut template = Template::new(options.rule.as_str());
    if let Some(key) = &options.result_key {
        template
            .set_default_result_key(key)
            .map_err(CliError::Setting)?;
    }
    if options.float {
        template.set_precision(Precision::Float);
    }

    if options.syntax_only {
        template.compile()?;
        return Ok(CheckResult::SyntaxValid);
    }

    let env = match options.env.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => serde_json::from_str(text)?,
        _ => serde_json::Value::Null,
    };
    debug!(float = options.float, "running check");
    let results = template.execute_json(env)?;
    Ok(CheckResult::Success(results))
}
