//! Entity payload marshalling: the predicate/object pairs of one
//! (subject, graph) description to and from bytes.
//!
//! The payload carries only predicate and object; subject and graph live in
//! the key and are re-attached on decode. Pairs are uvarint-framed binary:
//! per pair, the predicate as a length-prefixed IRI, then the object as a
//! kind byte (0 = IRI, 1 = blank node, 2 = literal) followed by its
//! length-prefixed parts, with presence flags for datatype and language.
//! Everything is UTF-8, so IRIs with percent-escapes and non-ASCII literal
//! content round-trip by construction. Pair order is not significant and is
//! not preserved; callers must treat the result as an unordered multiset.

use crate::codec::{Codec, CodecChain};
use crate::error::{CodecError, DecodeError, StoreError};
use crate::model::{Quad, Term};
use crate::varint::{push_uvarint, read_uvarint};

const KIND_IRI: u8 = 0;
const KIND_BNODE: u8 = 1;
const KIND_LITERAL: u8 = 2;

/// One (subject, graph) entity description: the unit of storage.
/// `bytes` is the serialized payload after all codec stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDesc {
    pub subject: Term,
    pub graph: Term,
    pub bytes: Vec<u8>,
}

/// Serializes entity descriptions through a codec chain.
pub struct Marshaller {
    codec: CodecChain,
}

impl Marshaller {
    pub fn new(codec: CodecChain) -> Self {
        Marshaller { codec }
    }

    /// Marshaller with no compression.
    pub fn plain() -> Self {
        Marshaller {
            codec: CodecChain::identity(),
        }
    }

    /// Serialize the predicate/object pairs of `quads` into an entity
    /// description for (`subject`, `graph`). The subject and graph carried
    /// by the individual quads are ignored; the caller has already grouped
    /// them.
    pub fn to_desc(
        &self,
        subject: &Term,
        graph: &Term,
        quads: &[Quad],
    ) -> Result<EntityDesc, CodecError> {
        let mut raw = Vec::new();
        for q in quads {
            write_term(&q.predicate, &mut raw);
            write_term(&q.object, &mut raw);
        }
        Ok(EntityDesc {
            subject: subject.clone(),
            graph: graph.clone(),
            bytes: self.codec.encode(&raw)?,
        })
    }

    /// Decode an entity description back into quads, re-attaching the
    /// description's subject and graph to every pair.
    pub fn to_quads(&self, desc: &EntityDesc) -> Result<Vec<Quad>, StoreError> {
        let raw = self.codec.decode(&desc.bytes)?;
        let mut quads = Vec::new();
        let mut off = 0usize;
        while off < raw.len() {
            let (predicate, next) = read_term(&raw, off)?;
            let (object, next) = read_term(&raw, next)?;
            off = next;
            quads.push(Quad {
                subject: desc.subject.clone(),
                predicate,
                object,
                graph: desc.graph.clone(),
            });
        }
        Ok(quads)
    }
}

fn write_str(s: &str, out: &mut Vec<u8>) {
    push_uvarint(s.len() as u64, out);
    out.extend_from_slice(s.as_bytes());
}

fn write_term(t: &Term, out: &mut Vec<u8>) {
    match t {
        Term::Iri(s) => {
            out.push(KIND_IRI);
            write_str(s, out);
        }
        Term::BNode(s) => {
            out.push(KIND_BNODE);
            write_str(s, out);
        }
        Term::Literal { lex, dt, lang } => {
            out.push(KIND_LITERAL);
            write_str(lex, out);
            match dt {
                Some(d) => {
                    out.push(1);
                    write_str(d, out);
                }
                None => out.push(0),
            }
            match lang {
                Some(l) => {
                    out.push(1);
                    write_str(l, out);
                }
                None => out.push(0),
            }
        }
    }
}

fn read_str(
    buf: &[u8],
    off: usize,
    what: &'static str,
) -> Result<(String, usize), DecodeError> {
    let (len, off) = read_uvarint(buf, off).ok_or(DecodeError::Truncated(off))?;
    let end = off
        .checked_add(len as usize)
        .filter(|&e| e <= buf.len())
        .ok_or(DecodeError::Truncated(off))?;
    let s = std::str::from_utf8(&buf[off..end]).map_err(|_| DecodeError::Utf8(what))?;
    Ok((s.to_string(), end))
}

fn read_flagged(
    buf: &[u8],
    off: usize,
    what: &'static str,
) -> Result<(Option<String>, usize), DecodeError> {
    let flag = *buf.get(off).ok_or(DecodeError::Truncated(off))?;
    match flag {
        0 => Ok((None, off + 1)),
        _ => {
            let (s, next) = read_str(buf, off + 1, what)?;
            Ok((Some(s), next))
        }
    }
}

fn read_term(buf: &[u8], off: usize) -> Result<(Term, usize), DecodeError> {
    let kind = *buf.get(off).ok_or(DecodeError::Truncated(off))?;
    let off = off + 1;
    match kind {
        KIND_IRI => {
            let (s, next) = read_str(buf, off, "iri")?;
            Ok((Term::Iri(s), next))
        }
        KIND_BNODE => {
            let (s, next) = read_str(buf, off, "bnode")?;
            Ok((Term::BNode(s), next))
        }
        KIND_LITERAL => {
            let (lex, next) = read_str(buf, off, "literal lexical form")?;
            let (dt, next) = read_flagged(buf, next, "datatype")?;
            let (lang, next) = read_flagged(buf, next, "language tag")?;
            Ok((Term::Literal { lex, dt, lang }, next))
        }
        other => Err(DecodeError::UnknownKind(other)),
    }
}
