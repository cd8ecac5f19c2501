use entitydb::{
    codec::{Codec, CodecChain, Gzip, Identity, Snappy, Zstd},
    payload::{EntityDesc, Marshaller},
    DecodeError, Quad, StoreError, Term,
};

fn subject() -> Term {
    Term::iri("http://example.org/thing/1")
}

fn graph() -> Term {
    Term::iri("http://example.org/graphs/g1")
}

fn sample_quads() -> Vec<Quad> {
    let s = subject();
    let g = graph();
    vec![
        Quad::new(
            s.clone(),
            Term::iri("http://purl.org/dc/terms/title"),
            Term::literal("plain value"),
            g.clone(),
        ),
        Quad::new(
            s.clone(),
            Term::iri("http://purl.org/dc/terms/description"),
            Term::Literal {
                lex: "café — ☕ größer".into(),
                dt: None,
                lang: Some("de".into()),
            },
            g.clone(),
        ),
        Quad::new(
            s.clone(),
            Term::iri("http://example.org/p"),
            Term::Literal {
                lex: "42".into(),
                dt: Some("http://www.w3.org/2001/XMLSchema#integer".into()),
                lang: None,
            },
            g.clone(),
        ),
        Quad::new(
            s.clone(),
            // Percent-escapes must survive the round trip untouched.
            Term::iri("http://example.org/p%C3%A9"),
            Term::iri("http://example.org/caf%C3%A9?q=a%20b"),
            g.clone(),
        ),
        Quad::new(
            s.clone(),
            Term::iri("http://example.org/rel"),
            Term::BNode("b17".into()),
            g,
        ),
    ]
}

fn as_multiset(mut quads: Vec<Quad>) -> Vec<Quad> {
    quads.sort();
    quads
}

fn assert_roundtrip(marshaller: &Marshaller) {
    let quads = sample_quads();
    let desc = marshaller
        .to_desc(&subject(), &graph(), &quads)
        .expect("serialize");
    let back = marshaller.to_quads(&desc).expect("deserialize");
    assert_eq!(as_multiset(back), as_multiset(quads));
}

#[test]
fn roundtrip_plain() {
    assert_roundtrip(&Marshaller::plain());
}

#[test]
fn roundtrip_each_codec() {
    assert_roundtrip(&Marshaller::new(CodecChain::single(Gzip)));
    assert_roundtrip(&Marshaller::new(CodecChain::single(Snappy)));
    assert_roundtrip(&Marshaller::new(CodecChain::single(Zstd::default())));
    assert_roundtrip(&Marshaller::new(CodecChain::single(Identity)));
}

#[test]
fn roundtrip_chained_codecs() {
    // Outer stage must be transparent to the inner one.
    let chain = CodecChain::single(Gzip).push(Snappy);
    assert_roundtrip(&Marshaller::new(chain));
}

#[test]
fn empty_description_roundtrips() {
    let m = Marshaller::new(CodecChain::single(Gzip));
    let desc = m.to_desc(&subject(), &graph(), &[]).expect("serialize");
    assert!(m.to_quads(&desc).expect("deserialize").is_empty());
}

#[test]
fn subject_and_graph_come_from_the_key_not_the_payload() {
    let m = Marshaller::plain();
    let desc = m
        .to_desc(&subject(), &graph(), &sample_quads())
        .expect("serialize");
    let other_subject = Term::iri("http://example.org/other");
    let moved = EntityDesc {
        subject: other_subject.clone(),
        graph: desc.graph.clone(),
        bytes: desc.bytes,
    };
    for q in m.to_quads(&moved).expect("deserialize") {
        assert_eq!(q.subject, other_subject);
        assert_eq!(q.graph, graph());
    }
}

#[test]
fn malformed_payload_is_a_decode_error() {
    let m = Marshaller::plain();
    let desc = EntityDesc {
        subject: subject(),
        graph: graph(),
        bytes: vec![9, 1, 2, 3],
    };
    match m.to_quads(&desc) {
        Err(StoreError::Decode(DecodeError::UnknownKind(9))) => {}
        other => panic!("expected unknown-kind decode error, got {:?}", other),
    }
}

#[test]
fn truncated_payload_is_a_decode_error() {
    let m = Marshaller::plain();
    let quads = sample_quads();
    let mut desc = m.to_desc(&subject(), &graph(), &quads).expect("serialize");
    desc.bytes.truncate(desc.bytes.len() - 3);
    assert!(matches!(
        m.to_quads(&desc),
        Err(StoreError::Decode(DecodeError::Truncated(_)))
    ));
}

#[test]
fn corrupt_compressed_payload_is_a_codec_error() {
    let m = Marshaller::new(CodecChain::single(Gzip));
    let desc = EntityDesc {
        subject: subject(),
        graph: graph(),
        bytes: b"definitely not gzip".to_vec(),
    };
    assert!(matches!(m.to_quads(&desc), Err(StoreError::Codec(_))));
}

#[test]
fn codecs_roundtrip_arbitrary_bytes() {
    let inputs: Vec<Vec<u8>> = vec![
        Vec::new(),
        vec![0u8],
        (0..=255u8).collect(),
        b"abc".repeat(10_000),
    ];
    let codecs: Vec<Box<dyn Codec>> = vec![
        Box::new(Identity),
        Box::new(Gzip),
        Box::new(Snappy),
        Box::new(Zstd::default()),
    ];
    for codec in &codecs {
        for input in &inputs {
            let encoded = codec.encode(input).expect("encode");
            let decoded = codec.decode(&encoded).expect("decode");
            assert_eq!(&decoded, input, "codec {}", codec.name());
        }
    }
}

#[test]
fn chain_applies_stages_in_order() {
    let chain = CodecChain::single(Snappy).push(Gzip);
    assert_eq!(chain.stage_names(), vec!["snappy", "gzip"]);
    let payload = b"the quick brown fox".repeat(100);
    let encoded = chain.encode(&payload).expect("encode");
    // Outermost stage last: the result is gzip-framed.
    assert_eq!(&encoded[..2], &[0x1f, 0x8b]);
    assert_eq!(chain.decode(&encoded).expect("decode"), payload);
}
