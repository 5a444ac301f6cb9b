//! # Substitution
//! A mustache subset without HTML escaping.
//!
//! Supported: `{{name}}`, `{{{name}}}`, `{{& name}}`, dotted names, `{{.}}`, sections
//! (`{{#name}}…{{/name}}`), inverted sections (`{{^name}}…{{/name}}`) and comments.
//! Partials and delimiter changes are rejected rather than silently ignored.
//!
//! Interpolating a name that resolves nowhere is an error, never a blank. A section over an
//! absent name is simply skipped.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::SubstitutionError;
use crate::utils::prompt_processing::{get_placeholders, tokenize, Token};
use crate::utils::JsonMap;

#[derive(Debug)]
enum Node<'a> {
    Text(&'a str),
    Variable(&'a str),
    Section {
        name: &'a str,
        inverted: bool,
        children: Vec<Node<'a>>,
    },
}

/// Renders `template` against `variables`.
pub fn render(template: &str, variables: &JsonMap) -> Result<String, SubstitutionError> {
    render_with_defaults(template, variables, &JsonMap::new())
}

/// Renders `template`; names absent from `variables` fall back to `defaults`.
pub fn render_with_defaults(template: &str, variables: &JsonMap, defaults: &JsonMap) -> Result<String, SubstitutionError> {
    if !template.contains("{{") {
        return Ok(template.to_string());
    }
    let nodes = parse(tokenize(template)?)?;
    let context = Context {
        variables,
        defaults,
        scopes: Vec::new(),
    };
    let mut output = String::with_capacity(template.len());
    context.render_nodes(&nodes, &mut output)?;
    Ok(output)
}

/// Top-level names referenced by `template`.
#[inline]
pub fn placeholders(template: &str) -> HashSet<String> {
    get_placeholders(template)
}

fn parse(tokens: Vec<Token<'_>>) -> Result<Vec<Node<'_>>, SubstitutionError> {
    // (section name, inverted, nodes collected before the section opened)
    let mut open: Vec<(&str, bool, Vec<Node<'_>>)> = Vec::new();
    let mut current = Vec::new();

    for token in tokens {
        match token {
            Token::Text(text) => current.push(Node::Text(text)),
            Token::Variable(name) => current.push(Node::Variable(name)),
            Token::Comment => {}
            Token::Unsupported(directive) => return Err(SubstitutionError::UnsupportedDirective(directive)),
            Token::SectionOpen(name) => open.push((name, false, std::mem::take(&mut current))),
            Token::InvertedOpen(name) => open.push((name, true, std::mem::take(&mut current))),
            Token::SectionClose(name) => {
                let Some((opened, inverted, parent)) = open.pop() else {
                    return Err(SubstitutionError::Syntax(format!("section '{name}' closed but never opened")));
                };
                if opened != name {
                    return Err(SubstitutionError::Syntax(format!(
                        "section '{opened}' closed by '{name}'"
                    )));
                }
                let children = std::mem::replace(&mut current, parent);
                current.push(Node::Section {
                    name,
                    inverted,
                    children,
                });
            }
        }
    }
    if let Some((name, _, _)) = open.last() {
        return Err(SubstitutionError::Syntax(format!("section '{name}' is never closed")));
    }
    Ok(current)
}

struct Context<'v> {
    variables: &'v JsonMap,
    defaults: &'v JsonMap,
    scopes: Vec<&'v Value>,
}

impl<'v> Context<'v> {
    fn render_nodes(&self, nodes: &[Node<'_>], output: &mut String) -> Result<(), SubstitutionError> {
        for node in nodes {
            match node {
                Node::Text(text) => output.push_str(text),
                Node::Variable(name) => {
                    // null is no value
                    let value = self
                        .lookup(name)?
                        .filter(|value| !value.is_null())
                        .ok_or_else(|| SubstitutionError::MissingVariable(name.to_string()))?;
                    push_value(value, output);
                }
                Node::Section {
                    name,
                    inverted,
                    children,
                } => self.render_section(name, *inverted, children, output)?,
            }
        }
        Ok(())
    }

    fn render_section(
        &self,
        name: &str,
        inverted: bool,
        children: &[Node<'_>],
        output: &mut String,
    ) -> Result<(), SubstitutionError> {
        let value = self.lookup(name)?;
        let truthy = value.is_some_and(is_truthy);
        if inverted {
            return if truthy { Ok(()) } else { self.render_nodes(children, output) };
        }
        let Some(value) = value.filter(|value| is_truthy(value)) else {
            return Ok(());
        };
        match value {
            Value::Array(items) => {
                for item in items {
                    self.with_scope(item).render_nodes(children, output)?;
                }
                Ok(())
            }
            other => self.with_scope(other).render_nodes(children, output),
        }
    }

    fn with_scope(&self, value: &'v Value) -> Context<'v> {
        let mut scopes = self.scopes.clone();
        scopes.push(value);
        Context {
            variables: self.variables,
            defaults: self.defaults,
            scopes,
        }
    }

    /// Resolves a possibly dotted name: the first segment is searched from the innermost scope
    /// outwards, the remaining segments only inside what the first one found.
    fn lookup(&self, name: &str) -> Result<Option<&'v Value>, SubstitutionError> {
        if name == "." {
            return match self.scopes.last() {
                Some(value) => Ok(Some(*value)),
                None => Err(SubstitutionError::Syntax("'{{.}}' used outside of a section".to_string())),
            };
        }
        let mut segments = name.split('.');
        let head = segments.next().unwrap_or(name);
        let found = self
            .scopes
            .iter()
            .rev()
            .copied()
            .find_map(|scope| scope.as_object().and_then(|map| map.get(head)))
            .or_else(|| self.variables.get(head).filter(|value| !value.is_null()))
            .or_else(|| self.defaults.get(head));

        Ok(segments.fold(found, |value, segment| value.and_then(Value::as_object).and_then(|map| map.get(segment))))
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

fn push_value(value: &Value, output: &mut String) {
    match value {
        Value::String(s) => output.push_str(s),
        // numbers, booleans, and compact JSON for arrays and objects
        other => output.push_str(&other.to_string()),
    }
}
