//! Dynamic selector micro-language for endpoint and tag dimensions.
//!
//! A selection list is either a literal list of values or a single-element
//! list holding one of:
//!
//! - `=all` — every candidate value,
//! - `=+<pattern>` — candidates matching the regular expression `<pattern>`,
//! - `=-<pattern>` — candidates not matching `<pattern>`.
//!
//! A selection whose first element starts with `$` is a host-variable
//! reference and is resolved by a [`TemplateSrv`](crate::template::TemplateSrv)
//! instead.

use regex::Regex;

use crate::models::SelectedTagKv;
use crate::Result;

const ALL: &str = "=all";
const INCLUDE: &str = "=+";
const EXCLUDE: &str = "=-";
const VARIABLE_SIGIL: char = '$';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    All,
    Include,
    Exclude,
}

impl Keyword {
    pub fn prefix(self) -> &'static str {
        match self {
            Keyword::All => ALL,
            Keyword::Include => INCLUDE,
            Keyword::Exclude => EXCLUDE,
        }
    }
}

/// Parsed form of a selection list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    AllOf,
    Include(String),
    Exclude(String),
    Variable(String),
    Explicit(Vec<String>),
}

impl Selection {
    /// Parses a selection list once, at the boundary where it enters the resolver.
    pub fn parse(selection: &[String]) -> Selection {
        if is_dynamic(selection) {
            let first = &selection[0];
            return match keyword_of(first) {
                Some(Keyword::All) => Selection::AllOf,
                Some(Keyword::Include) => Selection::Include(first[INCLUDE.len()..].to_string()),
                Some(Keyword::Exclude) => Selection::Exclude(first[EXCLUDE.len()..].to_string()),
                // The marker sits past the first slot; nothing to evaluate.
                None => Selection::Explicit(selection.to_vec()),
            };
        }
        if has_variable(selection) {
            return Selection::Variable(selection[0].clone());
        }
        Selection::Explicit(selection.to_vec())
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(
            self,
            Selection::AllOf | Selection::Include(_) | Selection::Exclude(_)
        )
    }

    /// Resolves a dynamic selection against `candidates`.
    ///
    /// Literal selections come back unchanged; variable references are left
    /// for the caller since they need a template collaborator.
    pub fn resolve(&self, candidates: &[String]) -> Result<Vec<String>> {
        match self {
            Selection::AllOf => Ok(candidates.to_vec()),
            Selection::Include(pattern) => filter(pattern, candidates, true),
            Selection::Exclude(pattern) => filter(pattern, candidates, false),
            Selection::Variable(raw) => Ok(vec![raw.clone()]),
            Selection::Explicit(values) => Ok(values.clone()),
        }
    }
}

fn starts_with_keyword(value: &str) -> bool {
    [ALL, INCLUDE, EXCLUDE]
        .iter()
        .any(|prefix| value.starts_with(prefix))
}

/// True if any entry of a flat selection list starts with a selector keyword.
pub fn is_dynamic<S: AsRef<str>>(selection: &[S]) -> bool {
    selection.iter().any(|value| starts_with_keyword(value.as_ref()))
}

/// True if any tag selection in the list carries a selector keyword.
pub fn is_dynamic_tags(selections: &[SelectedTagKv]) -> bool {
    selections.iter().any(|tag| is_dynamic(&tag.selection))
}

/// True if the first entry references a host variable.
pub fn has_variable<S: AsRef<str>>(selection: &[S]) -> bool {
    selection
        .first()
        .map(|first| first.as_ref().starts_with(VARIABLE_SIGIL))
        .unwrap_or(false)
}

/// Maps a selector string to its keyword class.
///
/// `=all` must match exactly; the pattern keywords match by prefix.
pub fn keyword_of(selector: &str) -> Option<Keyword> {
    if selector == ALL {
        Some(Keyword::All)
    } else if selector.starts_with(INCLUDE) {
        Some(Keyword::Include)
    } else if selector.starts_with(EXCLUDE) {
        Some(Keyword::Exclude)
    } else {
        None
    }
}

/// Evaluates `selector` against `candidates` for an already-classified keyword.
///
/// With no keyword the selector itself is returned as the only value. Invalid
/// patterns are reported to the caller as [`DatasourceError::InvalidPattern`].
///
/// [`DatasourceError::InvalidPattern`]: crate::DatasourceError::InvalidPattern
pub fn evaluate(
    keyword: Option<Keyword>,
    selector: &str,
    candidates: &[String],
) -> Result<Vec<String>> {
    match keyword {
        Some(Keyword::All) => Ok(candidates.to_vec()),
        Some(keyword @ (Keyword::Include | Keyword::Exclude)) => {
            let pattern = selector.strip_prefix(keyword.prefix()).unwrap_or(selector);
            filter(pattern, candidates, keyword == Keyword::Include)
        }
        None => Ok(vec![selector.to_string()]),
    }
}

fn filter(pattern: &str, candidates: &[String], keep_matches: bool) -> Result<Vec<String>> {
    if pattern.is_empty() || candidates.is_empty() {
        return Ok(Vec::new());
    }

    let regex = Regex::new(pattern)?;
    Ok(candidates
        .iter()
        .filter(|candidate| regex.is_match(candidate) == keep_matches)
        .cloned()
        .collect())
}
