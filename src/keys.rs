//! Byte-level key scheme shared by every backend.
//!
//! Storage key: `subject TAB graph`. Inverse key: `graph TAB subject`.
//! Prefix for range scans: `node TAB`. The separator is a tab, which can
//! never appear inside an encoded IRI because control characters are
//! rejected, so splitting on the first separator is unambiguous, encoding is
//! injective, and no two distinct subjects produce overlapping prefixes.
//! Byte-lexicographic order over keys equals IRI-string order over the
//! decoded pairs (UTF-8 is order-preserving and the separator sorts below
//! every printable byte's continuation).

use crate::error::KeyError;
use crate::model::Term;

/// Separator between the two IRIs of a key. Never legal inside an IRI's
/// canonical textual form.
pub const SEPARATOR: u8 = b'\t';

fn encodable_iri(t: &Term) -> Result<&str, KeyError> {
    match t {
        Term::Iri(s) => {
            if s.bytes().any(|b| b < 0x20 || b == 0x7f) {
                Err(KeyError::InvalidIri(s.clone()))
            } else {
                Ok(s)
            }
        }
        Term::BNode(b) => Err(KeyError::BlankNode(b.clone())),
        other => Err(KeyError::NotAnIri(other.to_string())),
    }
}

fn key_bytes(first: &Term, second: &Term) -> Result<Vec<u8>, KeyError> {
    let a = encodable_iri(first)?;
    let b = encodable_iri(second)?;
    let mut key = Vec::with_capacity(a.len() + b.len() + 1);
    key.extend_from_slice(a.as_bytes());
    key.push(SEPARATOR);
    key.extend_from_slice(b.as_bytes());
    Ok(key)
}

/// Forward-index key for one entity description.
pub fn storage_key(subject: &Term, graph: &Term) -> Result<Vec<u8>, KeyError> {
    key_bytes(subject, graph)
}

/// Inverse-index key for the same entity description.
pub fn inverse_key(subject: &Term, graph: &Term) -> Result<Vec<u8>, KeyError> {
    key_bytes(graph, subject)
}

/// Range-scan prefix for a node. A strict byte-prefix of every key whose
/// first component is `node`, and of no other key.
pub fn key_prefix(node: &Term) -> Result<Vec<u8>, KeyError> {
    let s = encodable_iri(node)?;
    let mut prefix = Vec::with_capacity(s.len() + 1);
    prefix.extend_from_slice(s.as_bytes());
    prefix.push(SEPARATOR);
    Ok(prefix)
}

/// Split a key on its first separator, recovering the two IRIs.
pub fn split_key(key: &[u8]) -> Result<(Term, Term), KeyError> {
    let pos = key
        .iter()
        .position(|&b| b == SEPARATOR)
        .ok_or_else(|| KeyError::Malformed(String::from_utf8_lossy(key).into_owned()))?;
    let first = std::str::from_utf8(&key[..pos])
        .map_err(|_| KeyError::Malformed(String::from_utf8_lossy(key).into_owned()))?;
    let second = std::str::from_utf8(&key[pos + 1..])
        .map_err(|_| KeyError::Malformed(String::from_utf8_lossy(key).into_owned()))?;
    Ok((Term::Iri(first.to_string()), Term::Iri(second.to_string())))
}

/// Swap the two components of a key, mapping an inverse key to its storage
/// key and vice versa. The bytes are already canonical; no re-validation.
pub fn invert_key(key: &[u8]) -> Result<Vec<u8>, KeyError> {
    let pos = key
        .iter()
        .position(|&b| b == SEPARATOR)
        .ok_or_else(|| KeyError::Malformed(String::from_utf8_lossy(key).into_owned()))?;
    let mut out = Vec::with_capacity(key.len());
    out.extend_from_slice(&key[pos + 1..]);
    out.push(SEPARATOR);
    out.extend_from_slice(&key[..pos]);
    Ok(out)
}
