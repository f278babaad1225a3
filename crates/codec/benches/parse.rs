use criterion::{criterion_group, criterion_main, Criterion};
use dom::{Monotonic, Storage};

// A synthetic event-log document: many small objects with mixed field
// kinds, the shape this library spends most of its life on.
fn event_log(records: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(records * 96);
    out.push(b'[');
    for i in 0..records {
        if i > 0 {
            out.push(b',');
        }
        out.extend_from_slice(
            format!(
                r#"{{"seq":{i},"level":"info","ok":{},"ratio":{}.5,"message":"record {i} with päyload"}}"#,
                i % 2 == 0,
                i % 100,
            )
            .as_bytes(),
        );
    }
    out.push(b']');
    out
}

pub fn parse_event_log(c: &mut Criterion) {
    let doc = event_log(1000);

    c.bench_function("parse_global", |b| {
        b.iter(|| codec::parse(&doc, Storage::global()).unwrap())
    });

    c.bench_function("parse_arena", |b| {
        b.iter(|| {
            let arena = Monotonic::new();
            let value = codec::parse(&doc, Storage::from(&arena)).unwrap();
            drop(value);
        })
    });

    let tree = codec::parse(&doc, Storage::global()).unwrap();
    c.bench_function("serialize", |b| b.iter(|| codec::to_vec(&tree)));
}

criterion_group!(benches, parse_event_log);
criterion_main!(benches);
