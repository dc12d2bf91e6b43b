// src/project/template.rs

//! Minimal model template compiler.
//!
//! Model files are SQL with `{{ ... }}` expression blocks and `{# ... #}`
//! comments. The supported expressions are calls with string arguments:
//!
//! ```text
//! {{ config(materialized='table', alias="orders_v2") }}
//! select * from {{ source('raw', 'orders') }}
//! join {{ ref('stg_customers') }} using (customer_id)
//! ```
//!
//! Names are resolved by a [`TemplateContext`], so the same compiler is used
//! while discovering dependencies and when producing executable SQL.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{Result, SqldagError};
use crate::project::resolver::Relation;

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{#.*?#\}").expect("comment regex is valid"));

static CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A\s*([A-Za-z_][A-Za-z0-9_]*)\s*\((.*)\)\s*\z").expect("call regex is valid")
});

static ARG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\A\s*(?:([A-Za-z_][A-Za-z0-9_]*)\s*=\s*)?(?:'([^']*)'|"([^"]*)")\s*(,|\z)"#)
        .expect("argument regex is valid")
});

/// Callbacks available inside `{{ ... }}` blocks.
pub trait TemplateContext {
    /// `ref('<model>')`
    fn resolve_ref(&mut self, name: &str) -> Result<Relation>;

    /// `source('<namespace>', '<table>')`
    fn resolve_source(&mut self, namespace: &str, table: &str) -> Result<Relation>;

    /// One `key='value'` pair of a `config(...)` call.
    fn set_config(&mut self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Arg {
    key: Option<String>,
    value: String,
}

/// Compile the raw text of `model` into SQL.
pub fn compile(model: &str, raw: &str, ctx: &mut dyn TemplateContext) -> Result<String> {
    let text = COMMENT_RE.replace_all(raw, "");
    if text.contains("{#") {
        return Err(template_error(model, "unterminated '{#' comment"));
    }

    let mut out = String::with_capacity(text.len());
    let mut rest: &str = &text;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = find_close(after_open)
            .ok_or_else(|| template_error(model, "unterminated '{{' expression"))?;

        let rendered = render_expression(model, &after_open[..end], ctx)?;
        out.push_str(&rendered);
        rest = &after_open[end + 2..];
    }

    if rest.contains("}}") {
        return Err(template_error(model, "unmatched '}}'"));
    }
    out.push_str(rest);

    Ok(out)
}

/// Byte offset of the first `}}` that is not inside a quoted argument.
fn find_close(expr: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut chars = expr.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '}' && chars.peek().is_some_and(|&(_, next)| next == '}') => {
                return Some(idx);
            }
            None => {}
        }
    }
    None
}

fn render_expression(model: &str, expr: &str, ctx: &mut dyn TemplateContext) -> Result<String> {
    let caps = CALL_RE
        .captures(expr)
        .ok_or_else(|| template_error(model, format!("unsupported expression '{}'", expr.trim())))?;
    let function = &caps[1];
    let args = parse_args(model, &caps[2])?;

    match function {
        "ref" => {
            let [name] = positional::<1>(model, function, &args)?;
            Ok(ctx.resolve_ref(name)?.to_string())
        }
        "source" => {
            let [namespace, table] = positional::<2>(model, function, &args)?;
            Ok(ctx.resolve_source(namespace, table)?.to_string())
        }
        "config" => {
            for arg in &args {
                let key = arg.key.as_deref().ok_or_else(|| {
                    template_error(model, "config() only accepts key='value' arguments")
                })?;
                ctx.set_config(key, &arg.value)?;
            }
            Ok(String::new())
        }
        other => Err(template_error(model, format!("unknown function '{other}'"))),
    }
}

fn parse_args(model: &str, src: &str) -> Result<Vec<Arg>> {
    let mut args = Vec::new();
    let mut rest = src;

    if rest.trim().is_empty() {
        return Ok(args);
    }

    while !rest.trim().is_empty() {
        let caps = ARG_RE.captures(rest).ok_or_else(|| {
            template_error(model, format!("cannot parse arguments '{}'", src.trim()))
        })?;
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        args.push(Arg {
            key: caps.get(1).map(|m| m.as_str().to_string()),
            value,
        });

        let consumed = caps.get(0).map(|m| m.end()).unwrap_or(rest.len());
        let trailing_comma = caps.get(4).is_some_and(|m| m.as_str() == ",");
        rest = &rest[consumed..];
        if trailing_comma && rest.trim().is_empty() {
            return Err(template_error(model, "trailing ',' in arguments"));
        }
    }

    Ok(args)
}

fn positional<'a, const N: usize>(
    model: &str,
    function: &str,
    args: &'a [Arg],
) -> Result<[&'a str; N]> {
    if args.len() != N || args.iter().any(|a| a.key.is_some()) {
        return Err(template_error(
            model,
            format!("{function}() takes exactly {N} positional string argument(s)"),
        ));
    }
    let mut out = [""; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg.value.as_str();
    }
    Ok(out)
}

fn template_error(model: &str, message: impl Into<String>) -> SqldagError {
    SqldagError::Template {
        model: model.to_string(),
        message: message.into(),
    }
}
