//! Query text parsing
//!
//! Grammar (clauses separated by `;`):
//!
//! ```text
//! query   := [select ';'] triple (';' triple)*
//! select  := "SELECT" var+
//! triple  := term term term
//! term    := var | iri | literal
//! var     := '?' name
//! iri     := '<' ... '>'
//! literal := bare-token | "'" any-chars "'"
//! ```
//!
//! # Example
//!
//! ```
//! use relax_db_query::parse::parse_query;
//! use relax_db_query::var_registry::VarRegistry;
//!
//! let mut vars = VarRegistry::new();
//! let query = parse_query("SELECT ?x; ?x <type> <singer>; ?x <bornIn> ?c", &mut vars).unwrap();
//! assert_eq!(query.patterns.len(), 2);
//! assert_eq!(query.projection, vec![vars.get("?x").unwrap()]);
//! ```

use crate::error::{QueryError, Result};
use crate::pattern::{Term, TriplePattern};
use crate::var_registry::{VarId, VarRegistry};
use std::sync::Arc;

/// Separator between clauses
pub const CLAUSE_SEPARATOR: char = ';';

/// A conjunctive triple-pattern query with projection variables
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Projected variables, in SELECT order
    pub projection: Vec<VarId>,
    /// Atoms of the query body
    pub patterns: Vec<TriplePattern>,
}

impl Query {
    /// Build a query, checking that every projected variable occurs in the body.
    ///
    /// An empty projection means "all body variables".
    pub fn new(projection: Vec<VarId>, patterns: Vec<TriplePattern>) -> Result<Self> {
        if patterns.is_empty() {
            return Err(QueryError::invalid_query("query has no triple patterns"));
        }

        let body = body_variables(&patterns);
        let projection = if projection.is_empty() {
            body.clone()
        } else {
            projection
        };

        let missing: Vec<VarId> = projection
            .iter()
            .filter(|v| !body.contains(v))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(QueryError::invalid_query(format!(
                "projection variables {:?} do not occur in the query body",
                missing
            )));
        }
        if projection.is_empty() {
            return Err(QueryError::invalid_query("query has no variables to project"));
        }

        Ok(Self {
            projection,
            patterns,
        })
    }

    /// All variables of the body, in first-occurrence order
    pub fn variables(&self) -> Vec<VarId> {
        body_variables(&self.patterns)
    }
}

fn body_variables(patterns: &[TriplePattern]) -> Vec<VarId> {
    let mut vars = Vec::new();
    for tp in patterns {
        for v in tp.variables() {
            if !vars.contains(&v) {
                vars.push(v);
            }
        }
    }
    vars
}

/// Parse query text, registering its variables in `vars`
pub fn parse_query(text: &str, vars: &mut VarRegistry) -> Result<Query> {
    let clauses: Vec<&str> = text
        .split(CLAUSE_SEPARATOR)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();

    let Some(first) = clauses.first() else {
        return Err(QueryError::invalid_query("empty query"));
    };

    let (projection, body) = match parse_select(first, vars)? {
        Some(projection) => (projection, &clauses[1..]),
        None => (Vec::new(), &clauses[..]),
    };

    let patterns = body
        .iter()
        .map(|clause| parse_triple(clause, vars))
        .collect::<Result<Vec<_>>>()?;

    Query::new(projection, patterns)
}

/// Parse a `SELECT ?a ?b` clause; `None` if the clause is not a SELECT
fn parse_select(clause: &str, vars: &mut VarRegistry) -> Result<Option<Vec<VarId>>> {
    let mut parts = clause.split_whitespace();
    match parts.next() {
        Some(head) if head.eq_ignore_ascii_case("SELECT") => {}
        _ => return Ok(None),
    }

    let mut projection = Vec::new();
    for part in parts {
        if !is_var_token(part) {
            return Err(QueryError::invalid_query(format!(
                "SELECT expects variables, got '{}'",
                part
            )));
        }
        let id = vars.get_or_insert(part);
        if !projection.contains(&id) {
            projection.push(id);
        }
    }
    if projection.is_empty() {
        return Err(QueryError::invalid_query("SELECT lists no variables"));
    }
    Ok(Some(projection))
}

fn parse_triple(clause: &str, vars: &mut VarRegistry) -> Result<TriplePattern> {
    let tokens = tokenize(clause)?;
    if tokens.len() != 3 {
        return Err(QueryError::invalid_query(format!(
            "expected 3 terms in '{}', found {}",
            clause,
            tokens.len()
        )));
    }

    let mut terms = tokens.into_iter().map(|tok| tok.into_term(vars));
    // Exactly three tokens were checked above.
    let (Some(s), Some(p), Some(o)) = (terms.next(), terms.next(), terms.next()) else {
        return Err(QueryError::Internal("triple token count changed".to_string()));
    };
    Ok(TriplePattern::named(s, p, o, vars))
}

#[derive(Debug, PartialEq)]
enum Token {
    Bare(String),
    Quoted(String),
}

impl Token {
    fn into_term(self, vars: &mut VarRegistry) -> Term {
        match self {
            Token::Quoted(lit) => Term::Literal(Arc::from(lit)),
            Token::Bare(tok) if is_var_token(&tok) => Term::Var(vars.get_or_insert(&tok)),
            Token::Bare(tok) if tok.starts_with('<') && tok.ends_with('>') => {
                Term::Iri(Arc::from(tok))
            }
            Token::Bare(tok) => Term::Literal(Arc::from(tok)),
        }
    }
}

fn is_var_token(tok: &str) -> bool {
    tok.len() > 1 && tok.starts_with('?')
}

/// Split a clause into whitespace-separated tokens; single-quoted tokens may
/// contain whitespace.
fn tokenize(clause: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = clause.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '\'' {
            chars.next();
            let mut lit = String::new();
            loop {
                match chars.next() {
                    Some('\'') => break,
                    Some(ch) => lit.push(ch),
                    None => {
                        return Err(QueryError::invalid_query(format!(
                            "unterminated quoted literal in '{}'",
                            clause
                        )))
                    }
                }
            }
            tokens.push(Token::Quoted(lit));
            continue;
        }

        let mut tok = String::new();
        while let Some(&ch) = chars.peek() {
            if ch.is_whitespace() {
                break;
            }
            tok.push(ch);
            chars.next();
        }
        tokens.push(Token::Bare(tok));
    }

    Ok(tokens)
}
