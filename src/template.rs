use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref VARIABLE: Regex = Regex::new(r"\$\{(\w+)\}|\$(\w+)").unwrap();
}

/// Host-side template variable substitution.
pub trait TemplateSrv: Send + Sync {
    /// Expands variable references in `raw`; multi-value variables come back comma-joined.
    fn replace(&self, raw: &str) -> String;
}

/// Substitutes `$name` / `${name}` from a fixed map, leaving unknown names verbatim.
#[derive(Debug, Clone, Default)]
pub struct VariableMap {
    variables: HashMap<String, String>,
}

impl VariableMap {
    pub fn new(variables: HashMap<String, String>) -> Self {
        Self { variables }
    }
}

impl TemplateSrv for VariableMap {
    fn replace(&self, raw: &str) -> String {
        VARIABLE
            .replace_all(raw, |caps: &Captures| {
                let name = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
                name.and_then(|name| self.variables.get(name))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}
