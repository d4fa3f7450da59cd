//! Directive parsing: turns the model's free-text `FETCH_TRNA_SEQUENCES`
//! directive into a structured RNAcentral search query plus a result limit.
//!
//! The grammar is the one taught to the model in the system prompt:
//! `field:"value"` terms, `[a to b]` ranges, `AND`/`OR`/`NOT` and parentheses.
//! Anything else in the directive (stray prose, unknown fields) is ignored.
//! Bare values must follow the colon directly (`amino_acid:Glu`), and once a
//! line has produced search terms, parsing stops at the first later line that
//! is not made up of query tokens alone.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use super::ToolError;

/// Search fields the model is allowed to use.
pub const SEARCH_FIELDS: &[&str] = &[
    "expert_db",
    "taxonomy",
    "tax_string",
    "species",
    "common_name",
    "rna_type",
    "so_rna_type_name",
    "amino_acid",
    "gene",
    "organelle",
    "description",
    "length",
    "pub_title",
    "author",
    "pubmed",
    "doi",
    "has_secondary_structure",
    "has_genomic_coordinates",
];

/// Meta-field controlling how many records are fetched.
pub const LIMIT_FIELD: &str = "num_sequences";

/// Database filter applied when the directive does not name one.
pub const DEFAULT_EXPERT_DB: &str = "GtRNAdb";

/// How many records the model asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "count")]
pub enum ResultLimit {
    /// The directive carried no `num_sequences` term.
    Unspecified,
    /// The model explicitly asked for everything (`num_sequences:"None"`).
    Unlimited,
    /// An explicit cap.
    Count(usize),
}

impl ResultLimit {
    pub fn as_count(&self) -> Option<usize> {
        match self {
            ResultLimit::Count(n) => Some(*n),
            ResultLimit::Unspecified | ResultLimit::Unlimited => None,
        }
    }

    /// Truncate in place; only an explicit `Count` limits anything.
    pub fn apply<T>(&self, items: &mut Vec<T>) {
        if let Some(n) = self.as_count() {
            items.truncate(n);
        }
    }
}

/// A single `field:value` search term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryTerm {
    pub field: String,
    pub value: String,
}

impl QueryTerm {
    fn is_range(&self) -> bool {
        self.value.starts_with('[') && self.value.ends_with(']')
    }
}

impl fmt::Display for QueryTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_range() {
            write!(f, "{}:{}", self.field, self.value)
        } else {
            write!(f, "{}:\"{}\"", self.field, self.value)
        }
    }
}

/// Structured search query ready to be sent to the search service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    terms: Vec<QueryTerm>,
    expression: String,
}

impl SearchQuery {
    /// All search terms in directive order (including the default `expert_db`).
    pub fn terms(&self) -> &[QueryTerm] {
        &self.terms
    }

    /// Values given for one field.
    pub fn values<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.terms
            .iter()
            .filter(move |t| t.field == field)
            .map(|t| t.value.as_str())
    }

    /// The boolean query expression.
    pub fn expression(&self) -> &str {
        &self.expression
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Parsed tool directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDirective {
    pub query: SearchQuery,
    pub limit: ResultLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoolOp {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Term(QueryTerm),
    Op(BoolOp),
    Open,
    Close,
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?P<field>[A-Za-z_]+)(?:\s*:\s*(?P<value>"[^"]*"|'[^']*'|\[[^\]]*\])|:(?P<bare>[^\s()"']+))|(?P<op>\b(?:AND|OR|NOT)\b)|(?P<open>\()|(?P<close>\))"#,
        )
        .expect("directive token pattern is valid")
    })
}

/// Parse directive text (the part of the reply after the trigger token).
///
/// # Errors
///
/// `ToolError::InvalidDirective` if no search term survives parsing or the
/// `num_sequences` value is neither a count nor a "no limit" sentinel.
pub fn construct_search_query(directive: &str) -> Result<ToolDirective, ToolError> {
    let text = directive.trim_start_matches(|c: char| c == ':' || c.is_whitespace());

    let mut limit: Option<ResultLimit> = None;
    let mut raw = Vec::new();

    for line in text.lines() {
        let seen_terms = raw.iter().any(|t| matches!(t, Token::Term(_)));
        if seen_terms && !is_query_line(line) {
            break;
        }
        scan_line(line, &mut raw, &mut limit)?;
    }

    let mut tokens = repair(raw);
    let mut terms: Vec<QueryTerm> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::Term(term) => Some(term.clone()),
            _ => None,
        })
        .collect();

    if terms.is_empty() {
        return Err(ToolError::InvalidDirective(format!(
            "no search terms found in directive: {}",
            truncate(directive, 200)
        )));
    }

    if !terms.iter().any(|t| t.field == "expert_db") {
        let default = QueryTerm {
            field: "expert_db".to_string(),
            value: DEFAULT_EXPERT_DB.to_string(),
        };
        let mut wrapped = vec![Token::Term(default.clone()), Token::Op(BoolOp::And)];
        if tokens.len() > 1 {
            wrapped.push(Token::Open);
            wrapped.append(&mut tokens);
            wrapped.push(Token::Close);
        } else {
            wrapped.append(&mut tokens);
        }
        tokens = wrapped;
        terms.insert(0, default);
    }

    Ok(ToolDirective {
        query: SearchQuery {
            terms,
            expression: render(&tokens),
        },
        limit: limit.unwrap_or(ResultLimit::Unspecified),
    })
}

fn scan_line(
    line: &str,
    raw: &mut Vec<Token>,
    limit: &mut Option<ResultLimit>,
) -> Result<(), ToolError> {
    for caps in token_regex().captures_iter(line) {
        if let Some(field) = caps.name("field") {
            let field = field.as_str().to_ascii_lowercase();
            let value = match (caps.name("value"), caps.name("bare")) {
                (Some(quoted), _) => normalize_value(quoted.as_str()),
                (None, Some(bare)) => bare.as_str().trim_end_matches(['.', ',', ';']).to_string(),
                (None, None) => continue,
            };

            if field == LIMIT_FIELD {
                if limit.is_none() {
                    *limit = Some(parse_limit(&value)?);
                } else {
                    tracing::debug!(value = %value, "Ignoring repeated num_sequences term");
                }
                continue;
            }
            if !SEARCH_FIELDS.contains(&field.as_str()) {
                tracing::debug!(field = %field, "Dropping unknown search field");
                continue;
            }
            if value.is_empty() {
                continue;
            }
            raw.push(Token::Term(QueryTerm { field, value }));
        } else if let Some(op) = caps.name("op") {
            let op = match op.as_str() {
                "AND" => BoolOp::And,
                "OR" => BoolOp::Or,
                _ => BoolOp::Not,
            };
            raw.push(Token::Op(op));
        } else if caps.name("open").is_some() {
            raw.push(Token::Open);
        } else if caps.name("close").is_some() {
            raw.push(Token::Close);
        }
    }
    Ok(())
}

/// A line holding nothing but query tokens, code fences and separators.
fn is_query_line(line: &str) -> bool {
    token_regex()
        .replace_all(line, "")
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '`' | '.' | ',' | ';'))
        .is_empty()
}

/// Strip quotes, normalize whitespace and range keywords.
fn normalize_value(raw: &str) -> String {
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(raw);
    let collapsed = unquoted.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.starts_with('[') && collapsed.ends_with(']') {
        let inner = &collapsed[1..collapsed.len() - 1];
        let bounds: Vec<&str> = inner
            .split_whitespace()
            .filter(|w| !w.eq_ignore_ascii_case("to"))
            .collect();
        if let [low, high] = bounds.as_slice() {
            return format!("[{} TO {}]", low, high);
        }
    }
    collapsed
}

fn parse_limit(value: &str) -> Result<ResultLimit, ToolError> {
    let v = value.trim();
    match v.to_ascii_lowercase().as_str() {
        "none" | "null" | "all" | "unlimited" | "no limit" => return Ok(ResultLimit::Unlimited),
        _ => {}
    }
    v.parse::<usize>()
        .map(ResultLimit::Count)
        .map_err(|_| ToolError::InvalidDirective(format!("invalid num_sequences value: {}", v)))
}

/// Drop dangling operators and unbalanced parentheses, and make the implicit
/// conjunction between adjacent terms explicit.
fn repair(raw: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(raw.len());
    let mut depth = 0usize;

    for token in raw {
        match token {
            Token::Term(_) | Token::Open => {
                if matches!(out.last(), Some(Token::Term(_)) | Some(Token::Close)) {
                    out.push(Token::Op(BoolOp::And));
                }
                if token == Token::Open {
                    depth += 1;
                }
                out.push(token);
            }
            Token::Close => {
                if depth == 0 {
                    continue;
                }
                close_group(&mut out);
                depth -= 1;
            }
            Token::Op(BoolOp::Not) => match out.last() {
                Some(Token::Op(BoolOp::Not)) => {}
                Some(Token::Term(_)) | Some(Token::Close) => {
                    out.push(Token::Op(BoolOp::And));
                    out.push(Token::Op(BoolOp::Not));
                }
                _ => out.push(Token::Op(BoolOp::Not)),
            },
            Token::Op(op) => {
                if matches!(out.last(), Some(Token::Term(_)) | Some(Token::Close)) {
                    out.push(Token::Op(op));
                }
            }
        }
    }

    while depth > 0 {
        close_group(&mut out);
        depth -= 1;
    }
    pop_trailing_ops(&mut out);
    out
}

/// Close the innermost open group, removing it entirely if it is empty.
fn close_group(out: &mut Vec<Token>) {
    pop_trailing_ops(out);
    if out.last() == Some(&Token::Open) {
        out.pop();
        pop_trailing_ops(out);
    } else {
        out.push(Token::Close);
    }
}

fn pop_trailing_ops(out: &mut Vec<Token>) {
    while matches!(out.last(), Some(Token::Op(_))) {
        out.pop();
    }
}

fn render(tokens: &[Token]) -> String {
    let mut s = String::new();
    let mut after_open = true;
    for token in tokens {
        if !after_open && *token != Token::Close {
            s.push(' ');
        }
        match token {
            Token::Term(term) => s.push_str(&term.to_string()),
            Token::Op(BoolOp::And) => s.push_str("AND"),
            Token::Op(BoolOp::Or) => s.push_str("OR"),
            Token::Op(BoolOp::Not) => s.push_str("NOT"),
            Token::Open => s.push('('),
            Token::Close => s.push(')'),
        }
        after_open = *token == Token::Open;
    }
    s
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    }
}
