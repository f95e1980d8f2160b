//! Segment tree used for route pattern matching.
//!
//! Patterns are split on `/` into segments; each node of the tree is one
//! segment and terminal nodes carry the index of the route they complete.
//! Lookup cost grows with the length of the path rather than with the number
//! of routes.
//!
//! Three kinds of segment exist:
//! - literals (`users`) match exactly
//! - parameters (`:id` or `{id}`) match any single segment
//! - splats (`*`) match one or more segments
//!
//! When several children could match, literals are tried first, then
//! parameters in insertion order, then the splat. A branch that dead-ends
//! backtracks to the next candidate, so `/users/new` beats `/users/:id` and
//! `/users/:id/posts` still matches when a sibling literal exists.

use std::fmt;
use std::sync::Arc;

use super::core::ParamVec;

/// One parsed pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(Arc<str>),
    Param(Arc<str>),
    Splat,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(s) => f.write_str(s),
            Segment::Param(name) => write!(f, ":{name}"),
            Segment::Splat => f.write_str("*"),
        }
    }
}

/// Split a pattern into segments. Empty segments (including a trailing
/// slash) are dropped.
pub(crate) fn parse_pattern(pattern: &str) -> Vec<Segment> {
    path_segments(pattern)
        .map(|segment| {
            if segment == "*" {
                Segment::Splat
            } else if let Some(name) = segment.strip_prefix(':').filter(|n| !n.is_empty()) {
                Segment::Param(Arc::from(name))
            } else if let Some(name) = segment
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                .filter(|n| !n.is_empty())
            {
                Segment::Param(Arc::from(name))
            } else {
                Segment::Literal(Arc::from(segment))
            }
        })
        .collect()
}

/// Canonical text of a parsed pattern: `/users/:id/*`.
pub(crate) fn canonical(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    segments.iter().map(|s| format!("/{s}")).collect()
}

pub(crate) fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Captures collected while walking the tree.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Captures {
    pub(crate) params: ParamVec,
    pub(crate) splats: Vec<String>,
}

#[derive(Clone, Default)]
struct PatternNode {
    route: Option<usize>,
    children: Vec<(Arc<str>, PatternNode)>,
    param_children: Vec<(Arc<str>, PatternNode)>,
    splat: Option<Box<PatternNode>>,
}

impl PatternNode {
    /// Mark the node reached by `segments` with `route`, unless a route is
    /// already there. Returns the index now stored at that node.
    fn insert(&mut self, segments: &[Segment], route: usize) -> usize {
        let Some((segment, remaining)) = segments.split_first() else {
            return *self.route.get_or_insert(route);
        };

        match segment {
            Segment::Literal(literal) => {
                if let Some((_, child)) = self.children.iter_mut().find(|(s, _)| s == literal) {
                    return child.insert(remaining, route);
                }
                let mut child = PatternNode::default();
                let stored = child.insert(remaining, route);
                self.children.push((Arc::clone(literal), child));
                stored
            }
            Segment::Param(name) => {
                if let Some((_, child)) = self.param_children.iter_mut().find(|(n, _)| n == name) {
                    return child.insert(remaining, route);
                }
                let mut child = PatternNode::default();
                let stored = child.insert(remaining, route);
                self.param_children.push((Arc::clone(name), child));
                stored
            }
            Segment::Splat => self
                .splat
                .get_or_insert_with(Box::default)
                .insert(remaining, route),
        }
    }

    fn search(&self, segments: &[&str], captures: &mut Captures) -> Option<usize> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.route;
        };

        for (literal, child) in &self.children {
            if literal.as_ref() == *segment {
                if let Some(route) = child.search(remaining, captures) {
                    return Some(route);
                }
            }
        }

        for (name, child) in &self.param_children {
            captures.params.push((Arc::clone(name), decode(segment)));
            if let Some(route) = child.search(remaining, captures) {
                return Some(route);
            }
            // Backtrack
            captures.params.pop();
        }

        if let Some(child) = &self.splat {
            for take in 1..=segments.len() {
                let joined = segments[..take]
                    .iter()
                    .map(|s| decode(s))
                    .collect::<Vec<_>>()
                    .join("/");
                captures.splats.push(joined);
                if let Some(route) = child.search(&segments[take..], captures) {
                    return Some(route);
                }
                captures.splats.pop();
            }
        }

        None
    }
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// Tree of route patterns resolving a path to a route index.
#[derive(Clone, Default)]
pub(crate) struct PatternTree {
    root: PatternNode,
}

impl PatternTree {
    pub(crate) fn insert(&mut self, segments: &[Segment], route: usize) -> usize {
        self.root.insert(segments, route)
    }

    /// Find the route a path resolves to, with its captures.
    pub(crate) fn search(&self, path: &str) -> Option<(usize, Captures)> {
        let segments: Vec<&str> = path_segments(path).collect();
        let mut captures = Captures::default();
        let route = self.root.search(&segments, &mut captures)?;
        Some((route, captures))
    }
}
