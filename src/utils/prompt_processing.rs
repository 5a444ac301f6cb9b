use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::SubstitutionError;

lazy_static! {
    /// One mustache tag: optional third brace, optional sigil, body, optional closing third brace.
    static ref TAG_MATCH_RE: Regex = Regex::new(r"(?s)\{\{(\{)?\s*([#^/!>=&]?)(.*?)(\})?\}\}").unwrap();
}

/// A lexed piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Text(&'a str),
    Variable(&'a str),
    SectionOpen(&'a str),
    InvertedOpen(&'a str),
    SectionClose(&'a str),
    Comment,
    Unsupported(String),
}

/// Splits a template into text and tags. Stray `{{` in text means an unclosed tag.
pub(crate) fn tokenize(template: &str) -> Result<Vec<Token<'_>>, SubstitutionError> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    for captures in TAG_MATCH_RE.captures_iter(template) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        // the regex can overlap a literal brace that followed a regular tag
        if whole.start() < cursor {
            continue;
        }
        push_text(&mut tokens, &template[cursor..whole.start()])?;

        let triple_open = captures.get(1).is_some();
        let triple_close = captures.get(4).is_some();
        let sigil = captures.get(2).map_or("", |m| m.as_str());
        let body = captures.get(3).map_or("", |m| m.as_str()).trim();
        let mut end = whole.end();

        if triple_open && !triple_close {
            return Err(SubstitutionError::Syntax(format!("unbalanced triple mustache around '{body}'")));
        }
        if !triple_open && triple_close {
            // `{{name}}}` is a tag followed by a literal brace
            end -= 1;
        }

        let token = match sigil {
            "!" => Token::Comment,
            ">" | "=" => Token::Unsupported(format!("{sigil}{body}")),
            _ if body.is_empty() => return Err(SubstitutionError::Syntax("empty tag '{{}}'".to_string())),
            "#" => Token::SectionOpen(body),
            "^" => Token::InvertedOpen(body),
            "/" => Token::SectionClose(body),
            "&" | "" => Token::Variable(body),
            other => Token::Unsupported(format!("{other}{body}")),
        };
        if triple_open && !matches!(token, Token::Variable(_)) {
            return Err(SubstitutionError::Syntax(format!("triple mustache must wrap a variable, got '{body}'")));
        }
        tokens.push(token);
        cursor = end;
    }
    push_text(&mut tokens, &template[cursor..])?;
    Ok(tokens)
}

fn push_text<'a>(tokens: &mut Vec<Token<'a>>, text: &'a str) -> Result<(), SubstitutionError> {
    if let Some(offset) = text.find("{{") {
        let excerpt: String = text[offset..].chars().take(24).collect();
        return Err(SubstitutionError::Syntax(format!("unclosed tag near '{excerpt}'")));
    }
    if !text.is_empty() {
        tokens.push(Token::Text(text));
    }
    Ok(())
}

/// Names of the top-level variables a template refers to, through interpolation or sections.
/// Tags nested inside a `{{#section}}` resolve against the section's value first, so they are
/// not reported; inverted sections open no scope. Malformed templates yield whatever could be
/// recognised.
pub fn get_placeholders(string: &str) -> HashSet<String> {
    // one entry per open section: whether it pushed a scope
    let mut open: Vec<bool> = Vec::new();
    let mut names = HashSet::new();
    for captures in TAG_MATCH_RE.captures_iter(string) {
        let sigil = captures.get(2).map_or("", |m| m.as_str());
        if sigil == "/" {
            open.pop();
            continue;
        }
        if !matches!(sigil, "" | "&" | "#" | "^") {
            continue;
        }
        let body = captures.get(3).map_or("", |m| m.as_str()).trim();
        let head = body.split('.').next().unwrap_or(body);
        if !open.contains(&true) && !head.is_empty() {
            names.insert(head.to_string());
        }
        if matches!(sigil, "#" | "^") {
            open.push(sigil == "#");
        }
    }
    names
}
