//! Route templates and method-keyed route tables.
//!
//! A template is a `/`-separated path whose segments are either literals or
//! `:name` parameters. Lookups prefer an exact key, then the template with
//! the most literal segments.

use std::collections::{BTreeMap, HashMap};

use gatekeeper_core_types::HttpMethod;

use crate::errors::ConfigError;

#[derive(Clone, Debug, Eq, PartialEq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RouteTemplate {
    raw: String,
    segments: Vec<Segment>,
}

/// Drops the query string and any trailing slash (the root stays `/`).
pub fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default().trim();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

impl RouteTemplate {
    pub fn parse(route: &str) -> Result<Self, ConfigError> {
        let invalid = |detail: &str| ConfigError::InvalidRoute {
            route: route.to_string(),
            detail: detail.to_string(),
        };
        if !route.trim().starts_with('/') {
            return Err(invalid("must start with `/`"));
        }
        let raw = normalize_path(route);
        let mut segments = Vec::new();
        let mut seen = Vec::new();
        for segment in split_segments(&raw) {
            if let Some(name) = segment.strip_prefix(':') {
                if name.is_empty() {
                    return Err(invalid("parameter without a name"));
                }
                if seen.contains(&name) {
                    return Err(invalid("duplicate parameter name"));
                }
                seen.push(name);
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Literal(segment.to_string()));
            }
        }
        Ok(Self { raw, segments })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The template with parameter names erased: `/a/:x` and `/a/:y` share
    /// the shape `/a/:`.
    pub fn shape(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(literal) => format!("/{literal}"),
                Segment::Param(_) => "/:".to_string(),
            })
            .collect()
    }

    pub fn is_exact(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, Segment::Literal(_)))
    }

    pub fn literal_segments(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Literal(_)))
            .count()
    }

    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.params().any(|param| param == name)
    }

    /// Extracted parameters when `path` (already normalised) fits the template.
    pub fn captures(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let parts: Vec<&str> = split_segments(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }
}

/// Result of a route lookup.
#[derive(Debug)]
pub struct RouteMatch<'a, T> {
    pub route: &'a str,
    pub value: &'a T,
    pub params: BTreeMap<String, String>,
    /// Exact keys rank above every template.
    pub specificity: usize,
}

/// Immutable `route -> method -> T` table built once from configuration.
#[derive(Clone, Debug)]
pub struct RouteTable<T> {
    exact: HashMap<String, BTreeMap<HttpMethod, T>>,
    templates: Vec<(RouteTemplate, BTreeMap<HttpMethod, T>)>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self {
            exact: HashMap::new(),
            templates: Vec::new(),
        }
    }
}

impl<T: Clone> RouteTable<T> {
    pub fn build(map: &BTreeMap<String, BTreeMap<HttpMethod, T>>) -> Result<Self, ConfigError> {
        let mut table = Self::default();
        for (route, methods) in map {
            let template = RouteTemplate::parse(route)?;
            if template.is_exact() {
                table
                    .exact
                    .entry(template.as_str().to_string())
                    .or_default()
                    .extend(methods.clone());
            } else {
                table.templates.push((template, methods.clone()));
            }
        }
        // most literal segments first; ties keep configuration order
        table
            .templates
            .sort_by(|(a, _), (b, _)| b.literal_segments().cmp(&a.literal_segments()));
        Ok(table)
    }
}

impl<T> RouteTable<T> {
    pub fn lookup(&self, path: &str, method: HttpMethod) -> Option<RouteMatch<'_, T>> {
        let path = normalize_path(path);
        if let Some((route, methods)) = self.exact.get_key_value(&path) {
            if let Some(value) = methods.get(&method) {
                return Some(RouteMatch {
                    route,
                    value,
                    params: BTreeMap::new(),
                    specificity: usize::MAX,
                });
            }
        }
        self.templates.iter().find_map(|(template, methods)| {
            let value = methods.get(&method)?;
            let params = template.captures(&path)?;
            Some(RouteMatch {
                route: template.as_str(),
                value,
                params,
                specificity: template.literal_segments(),
            })
        })
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, HttpMethod, u32)]) -> RouteTable<u32> {
        let mut map: BTreeMap<String, BTreeMap<HttpMethod, u32>> = BTreeMap::new();
        for (route, method, value) in entries {
            map.entry(route.to_string())
                .or_default()
                .insert(*method, *value);
        }
        RouteTable::build(&map).unwrap()
    }

    #[test]
    fn normalises_trailing_slash_and_query() {
        assert_eq!(normalize_path("/projects/"), "/projects");
        assert_eq!(normalize_path("/projects?page=2"), "/projects");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("users"), "/users");
    }

    #[test]
    fn template_captures_params() {
        let template = RouteTemplate::parse("/projects/:projectId/members/:userId").unwrap();
        let params = template.captures("/projects/p-1/members/u-7").unwrap();
        assert_eq!(params.get("projectId").map(String::as_str), Some("p-1"));
        assert_eq!(params.get("userId").map(String::as_str), Some("u-7"));
        assert!(template.captures("/projects/p-1/members").is_none());
        assert!(template.has_param("projectId"));
    }

    #[test]
    fn shape_erases_parameter_names() {
        let a = RouteTemplate::parse("/a/:x/b").unwrap();
        let b = RouteTemplate::parse("/a/:y/b/").unwrap();
        assert_eq!(a.shape(), "/a/:/b");
        assert_eq!(a.shape(), b.shape());
        assert_ne!(a.shape(), RouteTemplate::parse("/a/x/b").unwrap().shape());
        assert_eq!(RouteTemplate::parse("/").unwrap().shape(), "/");
    }

    #[test]
    fn rejects_malformed_templates() {
        assert!(RouteTemplate::parse("projects").is_err());
        assert!(RouteTemplate::parse("/projects/:").is_err());
        assert!(RouteTemplate::parse("/a/:id/b/:id").is_err());
    }

    #[test]
    fn exact_route_wins_over_template() {
        let table = table(&[
            ("/projects/:id", HttpMethod::Get, 1),
            ("/projects/public", HttpMethod::Get, 2),
        ]);
        assert_eq!(*table.lookup("/projects/public", HttpMethod::Get).unwrap().value, 2);
        assert_eq!(*table.lookup("/projects/p-1", HttpMethod::Get).unwrap().value, 1);
    }

    #[test]
    fn more_literal_template_wins() {
        let table = table(&[
            ("/:kind/:id/export", HttpMethod::Post, 1),
            ("/projects/:id/export", HttpMethod::Post, 2),
        ]);
        let hit = table.lookup("/projects/p-1/export", HttpMethod::Post).unwrap();
        assert_eq!(*hit.value, 2);
        assert_eq!(hit.route, "/projects/:id/export");
    }

    #[test]
    fn method_must_be_mapped() {
        let table = table(&[("/projects", HttpMethod::Get, 1)]);
        assert!(table.lookup("/projects", HttpMethod::Delete).is_none());
        assert!(table.lookup("/datasets", HttpMethod::Get).is_none());
    }
}
