use entitydb::{
    BlankNodePolicy, BuildError, BuilderOptions, CancellationToken, CodecChain, DatabaseBuilder,
    EntityStore, IndexWriter, KvEntityDatabase, Marshaller, MemoryEntityDatabase,
    MemoryIndexWriter, Quad, SortOptions, StorageSink, Term, Zstd,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn marshaller() -> Marshaller {
    Marshaller::new(CodecChain::single(Zstd::default()))
}

fn tiny_batches() -> BuilderOptions {
    BuilderOptions {
        sort: SortOptions {
            batch_size: 3,
            ..SortOptions::default()
        },
        ..BuilderOptions::default()
    }
}

/// Quads sorted by (subject, graph): two graphs and two quads per subject.
fn sorted_quads(subjects: usize) -> Vec<Quad> {
    let mut quads = Vec::new();
    for i in 0..subjects {
        let s = Term::iri(format!("http://ex/s{:03}", i));
        for g in ["http://ex/g0", "http://ex/g1"] {
            for p in ["http://ex/p", "http://ex/q"] {
                quads.push(Quad::new(
                    s.clone(),
                    Term::iri(p),
                    Term::literal(format!("{} {} {}", i, g, p)),
                    Term::iri(g),
                ));
            }
        }
    }
    quads
}

fn build_database(quads: Vec<Quad>, opts: BuilderOptions) -> MemoryEntityDatabase {
    let dir = tempfile::tempdir().expect("tempdir");
    let builder = DatabaseBuilder::with_options(marshaller(), opts);
    let mut forward = MemoryIndexWriter::new();
    let mut inverse = MemoryIndexWriter::new();
    let stats = builder
        .build(
            quads,
            &mut forward,
            &mut inverse,
            dir.path(),
            &CancellationToken::new(),
        )
        .expect("build");
    assert!(!stats.cancelled);
    KvEntityDatabase::from_indexes(forward.into_index(), inverse.into_index(), marshaller())
}

#[test]
fn bulk_build_matches_incremental_loading() {
    init();
    let quads = sorted_quads(20);
    let bulk = build_database(quads.clone(), tiny_batches());

    let mut incremental = MemoryEntityDatabase::memory(marshaller());
    for chunk in quads.chunks(2) {
        // sorted_quads emits exactly one (subject, graph) pair per pair of quads
        let s = chunk[0].subject.clone();
        let g = chunk[0].graph.clone();
        incremental.put(&s, &g, chunk).expect("put");
    }

    assert_eq!(bulk.index_sizes(), incremental.index_sizes());
    for i in 0..20 {
        let s = Term::iri(format!("http://ex/s{:03}", i));
        let mut from_bulk = bulk.get(&s).expect("get");
        let mut from_inc = incremental.get(&s).expect("get");
        from_bulk.sort();
        from_inc.sort();
        assert_eq!(from_bulk, from_inc);
    }

    let bulk_all: Vec<Term> = bulk
        .all()
        .expect("all")
        .map(|r| r.expect("entry").0)
        .collect();
    let inc_all: Vec<Term> = incremental
        .all()
        .expect("all")
        .map(|r| r.expect("entry").0)
        .collect();
    assert_eq!(bulk_all, inc_all);
    assert_eq!(bulk_all.len(), 20);
}

#[test]
fn build_stats_count_quads_and_entities() {
    let quads = sorted_quads(5);
    let dir = tempfile::tempdir().expect("tempdir");
    let builder = DatabaseBuilder::with_options(marshaller(), tiny_batches());
    let mut forward = MemoryIndexWriter::new();
    let mut inverse = MemoryIndexWriter::new();
    let stats = builder
        .build(
            quads,
            &mut forward,
            &mut inverse,
            dir.path(),
            &CancellationToken::new(),
        )
        .expect("build");
    assert_eq!(stats.quads, 20);
    assert_eq!(stats.entities, 10);
    assert_eq!(stats.skipped, 0);
    assert!(!stats.cancelled);
}

#[test]
fn bulk_built_store_supports_graph_deletion() {
    let mut db = build_database(sorted_quads(6), tiny_batches());
    let g0 = Term::iri("http://ex/g0");
    let g1 = Term::iri("http://ex/g1");
    assert_eq!(db.get_graph(&g0).expect("get_graph").len(), 12);

    db.delete_graph(&g0).expect("delete_graph");
    assert!(db.get_graph(&g0).expect("get_graph").is_empty());
    assert_eq!(db.get_graph(&g1).expect("get_graph").len(), 12);
    assert_eq!(db.index_sizes(), (6, 6));
}

#[test]
fn blank_subject_groups_are_skipped() {
    let mut quads = sorted_quads(3);
    quads.push(Quad::new(
        Term::BNode("b1".into()),
        Term::iri("http://ex/p"),
        Term::literal("anonymous"),
        Term::iri("http://ex/g0"),
    ));
    let dir = tempfile::tempdir().expect("tempdir");
    let builder = DatabaseBuilder::new(marshaller());
    let mut forward = MemoryIndexWriter::new();
    let mut inverse = MemoryIndexWriter::new();
    let stats = builder
        .build(
            quads,
            &mut forward,
            &mut inverse,
            dir.path(),
            &CancellationToken::new(),
        )
        .expect("build");
    assert_eq!(stats.quads, 13);
    assert_eq!(stats.entities, 6);
    assert_eq!(stats.skipped, 1);

    let db =
        KvEntityDatabase::from_indexes(forward.into_index(), inverse.into_index(), marshaller());
    assert_eq!(db.index_sizes(), (6, 6));
}

#[test]
fn pre_cancelled_token_stops_before_any_work() {
    let dir = tempfile::tempdir().expect("tempdir");
    let builder = DatabaseBuilder::new(marshaller());
    let mut forward = MemoryIndexWriter::new();
    let mut inverse = MemoryIndexWriter::new();
    let token = CancellationToken::new();
    token.cancel();
    let stats = builder
        .build(sorted_quads(10), &mut forward, &mut inverse, dir.path(), &token)
        .expect("build");
    assert!(stats.cancelled);
    assert_eq!(stats.quads, 0);
    assert_eq!(stats.entities, 0);

    // Cancelled builds still finish cleanly, just empty.
    let db =
        KvEntityDatabase::from_indexes(forward.into_index(), inverse.into_index(), marshaller());
    assert_eq!(db.index_sizes(), (0, 0));
}

#[test]
fn cancellation_mid_stream_stops_cleanly() {
    init();
    let token = CancellationToken::new();
    let trigger = token.clone();
    let quads: Vec<Quad> = sorted_quads(10);
    let total = quads.len();
    let stream = quads.into_iter().enumerate().map(move |(i, q)| {
        if i == 5 {
            trigger.cancel();
        }
        q
    });

    let dir = tempfile::tempdir().expect("tempdir");
    let builder = DatabaseBuilder::with_options(marshaller(), tiny_batches());
    let mut forward = MemoryIndexWriter::new();
    let mut inverse = MemoryIndexWriter::new();
    let stats = builder
        .build(stream, &mut forward, &mut inverse, dir.path(), &token)
        .expect("build");
    assert!(stats.cancelled);
    assert!(stats.quads < total as u64);

    let db =
        KvEntityDatabase::from_indexes(forward.into_index(), inverse.into_index(), marshaller());
    let (fwd, inv) = db.index_sizes();
    assert_eq!(fwd, inv);
    assert!(fwd < 20);
    for entry in db.all().expect("all") {
        let (_, quads) = entry.expect("entry");
        assert!(!quads.is_empty());
    }
}

#[test]
fn token_can_be_cleared_and_reused() {
    let token = CancellationToken::new();
    token.cancel();
    assert!(token.is_cancelled());
    token.clear();
    assert!(!token.is_cancelled());

    let dir = tempfile::tempdir().expect("tempdir");
    let builder = DatabaseBuilder::new(marshaller());
    let mut forward = MemoryIndexWriter::new();
    let mut inverse = MemoryIndexWriter::new();
    let stats = builder
        .build(sorted_quads(2), &mut forward, &mut inverse, dir.path(), &token)
        .expect("build");
    assert!(!stats.cancelled);
    assert_eq!(stats.entities, 4);
}

#[test]
fn index_writer_rejects_out_of_order_appends() {
    let mut writer = MemoryIndexWriter::new();
    writer.append(b"http://ex/a\thttp://ex/g", b"x").expect("append");
    writer.append(b"http://ex/a\thttp://ex/g", b"y").expect("equal keys are fine");
    assert!(matches!(
        writer.append(b"http://ex/Z\thttp://ex/g", b"z"),
        Err(BuildError::OutOfOrder)
    ));
}

#[test]
fn storage_sink_loads_a_sorted_stream() {
    init();
    let mut db = MemoryEntityDatabase::memory(marshaller());
    let quads = sorted_quads(4);
    {
        let mut sink = StorageSink::new(&mut db);
        for q in quads.clone() {
            sink.send(q);
        }
        sink.flush();
        assert_eq!(sink.quad_count(), 16);
    }
    assert_eq!(db.index_sizes(), (8, 8));
    let s = Term::iri("http://ex/s000");
    let mut stored = db.get(&s).expect("get");
    stored.sort();
    let mut expected: Vec<Quad> = quads.into_iter().filter(|q| q.subject == s).collect();
    expected.sort();
    assert_eq!(stored, expected);
}

#[test]
fn storage_sink_skips_entities_the_store_rejects() {
    init();
    let mut db =
        MemoryEntityDatabase::memory(marshaller()).with_policy(BlankNodePolicy::Reject);
    let g = Term::iri("http://ex/g0");
    let p = Term::iri("http://ex/p");
    {
        let mut sink = StorageSink::new(&mut db);
        sink.send(Quad::new(
            Term::iri("http://ex/s000"),
            p.clone(),
            Term::literal("first"),
            g.clone(),
        ));
        // This entity's put fails under the strict policy; the sink logs
        // the failure and keeps loading.
        sink.send(Quad::new(
            Term::BNode("b1".into()),
            p.clone(),
            Term::literal("anonymous"),
            g.clone(),
        ));
        sink.send(Quad::new(
            Term::iri("http://ex/s001"),
            p.clone(),
            Term::literal("last"),
            g.clone(),
        ));
        sink.flush();
        assert_eq!(sink.quad_count(), 3);
    }
    assert_eq!(db.index_sizes(), (2, 2));
    assert!(db.exists(&Term::iri("http://ex/s000")).expect("exists"));
    assert!(db.exists(&Term::iri("http://ex/s001")).expect("exists"));
}

#[test]
fn empty_input_builds_an_empty_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let builder = DatabaseBuilder::new(marshaller());
    let mut forward = MemoryIndexWriter::new();
    let mut inverse = MemoryIndexWriter::new();
    let stats = builder
        .build(
            Vec::<Quad>::new(),
            &mut forward,
            &mut inverse,
            dir.path(),
            &CancellationToken::new(),
        )
        .expect("build");
    assert_eq!(stats, Default::default());
    let db =
        KvEntityDatabase::from_indexes(forward.into_index(), inverse.into_index(), marshaller());
    assert_eq!(db.index_sizes(), (0, 0));
}
