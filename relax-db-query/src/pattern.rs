//! Pattern types for query representation
//!
//! A query is a conjunction of triple patterns ("atoms"). Each position of a
//! pattern is a variable or a constant; constants are IRIs (`<...>`) or
//! literals.

use crate::var_registry::{VarId, VarRegistry};
use std::fmt;
use std::sync::Arc;

/// A term in a triple pattern - variable or constant
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    /// Variable binding
    Var(VarId),
    /// Constant resource, stored with its angle brackets (`<alice>`)
    Iri(Arc<str>),
    /// Constant literal, stored without quotes
    Literal(Arc<str>),
}

impl Term {
    /// Get the variable if this is a Var term
    pub fn as_var(&self) -> Option<VarId> {
        match self {
            Term::Var(v) => Some(*v),
            _ => None,
        }
    }

    fn render(&self, vars: Option<&VarRegistry>) -> String {
        match self {
            Term::Var(v) => match vars {
                Some(reg) => reg.display(*v),
                None => format!("?_{}", v.0),
            },
            Term::Iri(iri) => iri.to_string(),
            Term::Literal(lit) if lit.contains(char::is_whitespace) => format!("'{}'", lit),
            Term::Literal(lit) => lit.to_string(),
        }
    }
}

/// A triple pattern: subject, predicate, object
///
/// `text` is the human-readable form used as the sub-query label of the
/// scan that answers this pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TriplePattern {
    pub s: Term,
    pub p: Term,
    pub o: Term,
    text: Arc<str>,
}

impl TriplePattern {
    /// Create a pattern labelled with positional variable names
    pub fn new(s: Term, p: Term, o: Term) -> Self {
        let text = render_text(&s, &p, &o, None);
        Self { s, p, o, text }
    }

    /// Create a pattern labelled with the registry's variable names
    pub fn named(s: Term, p: Term, o: Term, vars: &VarRegistry) -> Self {
        let text = render_text(&s, &p, &o, Some(vars));
        Self { s, p, o, text }
    }

    /// Get the variables in this pattern (in order: s, p, o), without duplicates
    pub fn variables(&self) -> Vec<VarId> {
        let mut vars = Vec::with_capacity(3);
        for v in [&self.s, &self.p, &self.o].into_iter().filter_map(Term::as_var) {
            if !vars.contains(&v) {
                vars.push(v);
            }
        }
        vars
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Copy of this pattern with one position replaced, as relaxations do
    pub fn with_predicate(&self, p: Term, vars: &VarRegistry) -> Self {
        Self::named(self.s.clone(), p, self.o.clone(), vars)
    }

    pub fn with_object(&self, o: Term, vars: &VarRegistry) -> Self {
        Self::named(self.s.clone(), self.p.clone(), o, vars)
    }
}

fn render_text(s: &Term, p: &Term, o: &Term, vars: Option<&VarRegistry>) -> Arc<str> {
    Arc::from(format!(
        "{} {} {}",
        s.render(vars),
        p.render(vars),
        o.render(vars)
    ))
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
