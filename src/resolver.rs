//! Turns one authored query into a concrete counter full-match request.

use tracing::{debug, warn};

use crate::client::{Client, Transport};
use crate::models::{Category, CounterQuery, QuerySpec, Scope, SelectedTagKv, TagKv};
use crate::selector::{self, Selection};
use crate::template::TemplateSrv;
use crate::Result;

pub struct QueryResolver<'a, T> {
    client: &'a Client<T>,
    template: &'a dyn TemplateSrv,
}

impl<'a, T: Transport> QueryResolver<'a, T> {
    pub fn new(client: &'a Client<T>, template: &'a dyn TemplateSrv) -> Self {
        Self { client, template }
    }

    /// Resolves `query`, or `None` when there is nothing to fetch.
    ///
    /// Backend failures while loading live candidates are returned as errors;
    /// unmatched or invalid selectors only narrow the result.
    pub async fn resolve(&self, query: &QuerySpec) -> Result<Option<CounterQuery>> {
        let scope = self.resolve_scope(query).await?;
        if query.metric.is_empty() || scope.is_empty() {
            debug!(metric = %query.metric, "query has no metric or no endpoints, skipping");
            return Ok(None);
        }

        let tagkv = self.resolve_tags(query, &scope).await?;
        Ok(Some(CounterQuery {
            scope,
            metric: query.metric.clone(),
            tagkv,
        }))
    }

    async fn resolve_scope(&self, query: &QuerySpec) -> Result<Scope> {
        if query.category == Category::HostFree {
            let nids = query.node_ids.iter().map(|nid| nid.to_string()).collect();
            return Ok(Scope::Nids(nids));
        }

        let endpoints = match Selection::parse(&query.endpoint_selection) {
            selection if selection.is_dynamic() => {
                let candidates = match query.node_ids.first() {
                    Some(&nid) => self.client.fetch_endpoints(nid).await?,
                    None => Vec::new(),
                };
                resolve_leniently(&selection, &candidates)
            }
            Selection::Variable(raw) => expand_variable(&raw, self.template),
            Selection::Explicit(values) => values,
            // `is_dynamic` covers the remaining variants.
            _ => Vec::new(),
        };
        Ok(Scope::Endpoints(endpoints))
    }

    async fn resolve_tags(&self, query: &QuerySpec, scope: &Scope) -> Result<Vec<SelectedTagKv>> {
        if !selector::is_dynamic_tags(&query.tag_selections) {
            return Ok(query.tag_selections.clone());
        }

        let universe = if query.tagkv.is_empty() {
            self.client
                .fetch_tagkv(scope, std::slice::from_ref(&query.metric))
                .await?
                .tagkv
        } else {
            query.tagkv.clone()
        };
        Ok(resolve_tag_selections(&query.tag_selections, &universe))
    }
}

/// Resolves every dynamic tag selection against its key's value universe.
pub fn resolve_tag_selections(selections: &[SelectedTagKv], universe: &[TagKv]) -> Vec<SelectedTagKv> {
    selections
        .iter()
        .map(|tag| {
            if !selector::is_dynamic(&tag.selection) {
                return tag.clone();
            }
            let candidates = universe
                .iter()
                .find(|kv| kv.tag_key == tag.tag_key)
                .map(|kv| kv.tag_values.as_slice())
                .unwrap_or_default();
            SelectedTagKv {
                tag_key: tag.tag_key.clone(),
                selection: resolve_leniently(&Selection::parse(&tag.selection), candidates),
            }
        })
        .collect()
}

/// Expands a `$variable` selection through the host and splits the comma-joined result.
pub fn expand_variable(raw: &str, template: &dyn TemplateSrv) -> Vec<String> {
    template
        .replace(raw)
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn resolve_leniently(selection: &Selection, candidates: &[String]) -> Vec<String> {
    selection.resolve(candidates).unwrap_or_else(|e| {
        warn!("{}, treating as no matches", e);
        Vec::new()
    })
}
