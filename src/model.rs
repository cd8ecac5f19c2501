//! RDF terms and quads as handled by the store.
//!
//! Subjects, predicates, and graph names are IRIs at the storage boundary;
//! objects may be any term. Blank-node subjects and graphs are handled
//! according to [`crate::store::BlankNodePolicy`] before they ever reach the
//! key scheme.

use std::fmt;

/// RDF term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    /// IRI/URI node.
    Iri(String),
    /// Blank node label (with or without `_:` prefix).
    BNode(String),
    /// Literal with optional datatype or language tag.
    Literal {
        lex: String,
        dt: Option<String>,
        lang: Option<String>,
    },
}

impl Term {
    /// Shorthand for an IRI term.
    pub fn iri(s: impl Into<String>) -> Self {
        Term::Iri(s.into())
    }

    /// Shorthand for a plain literal.
    pub fn literal(lex: impl Into<String>) -> Self {
        Term::Literal {
            lex: lex.into(),
            dt: None,
            lang: None,
        }
    }

    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Term::BNode(_))
    }

    /// The IRI string, if this term is an IRI.
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(s) => Some(s),
            _ => None,
        }
    }
}

fn escape_literal(f: &mut fmt::Formatter<'_>, lex: &str) -> fmt::Result {
    for c in lex.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\r' => write!(f, "\\r")?,
            '\t' => write!(f, "\\t")?,
            _ => write!(f, "{}", c)?,
        }
    }
    Ok(())
}

impl fmt::Display for Term {
    /// NTriples-style rendering, used for logging and diagnostics.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(s) => write!(f, "<{}>", s),
            Term::BNode(b) => {
                if b.starts_with("_:") {
                    write!(f, "{}", b)
                } else {
                    write!(f, "_:{}", b)
                }
            }
            Term::Literal { lex, dt, lang } => {
                write!(f, "\"")?;
                escape_literal(f, lex)?;
                write!(f, "\"")?;
                if let Some(lang) = lang {
                    write!(f, "@{}", lang)
                } else if let Some(dt) = dt {
                    write!(f, "^^<{}>", dt)
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// A (subject, predicate, object, graph) statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quad {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    pub graph: Term,
}

impl Quad {
    pub fn new(subject: Term, predicate: Term, object: Term, graph: Term) -> Self {
        Quad {
            subject,
            predicate,
            object,
            graph,
        }
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} .",
            self.subject, self.predicate, self.object, self.graph
        )
    }
}

#[cfg(feature = "oxigraph")]
fn term_from_ox_term_ref(t: &oxigraph::model::TermRef<'_>) -> Term {
    use oxigraph::model::TermRef as TR;
    match t {
        TR::NamedNode(n) => Term::Iri(n.as_str().to_string()),
        TR::BlankNode(b) => Term::BNode(format!("_:{}", b.as_str())),
        TR::Literal(l) => {
            let lex = l.value().to_string();
            if let Some(lang) = l.language() {
                Term::Literal {
                    lex,
                    dt: None,
                    lang: Some(lang.to_string()),
                }
            } else {
                Term::Literal {
                    lex,
                    dt: Some(l.datatype().as_str().to_string()),
                    lang: None,
                }
            }
        }
        _ => Term::Iri(t.to_string()),
    }
}

/// Convert an oxigraph quad into a [`Quad`].
///
/// Returns `None` for quads in the default graph or with a subject kind the
/// store cannot represent; callers decide whether that is an error.
#[cfg(feature = "oxigraph")]
pub fn quad_from_oxigraph(q: oxigraph::model::QuadRef<'_>) -> Option<Quad> {
    use oxigraph::model::{GraphNameRef, SubjectRef};
    let subject = match q.subject {
        SubjectRef::NamedNode(n) => Term::Iri(n.as_str().to_string()),
        SubjectRef::BlankNode(b) => Term::BNode(format!("_:{}", b.as_str())),
        _ => return None,
    };
    let predicate = Term::Iri(q.predicate.as_str().to_string());
    let object = term_from_ox_term_ref(&q.object);
    let graph = match q.graph_name {
        GraphNameRef::NamedNode(n) => Term::Iri(n.as_str().to_string()),
        GraphNameRef::BlankNode(b) => Term::BNode(format!("_:{}", b.as_str())),
        GraphNameRef::DefaultGraph => return None,
    };
    Some(Quad {
        subject,
        predicate,
        object,
        graph,
    })
}
