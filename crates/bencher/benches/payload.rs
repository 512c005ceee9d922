use bencher::TestBody;
use bytes::{Bytes, BytesMut};
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rill_http::codec::PayloadEncoder;
use rill_http::protocol::{PayloadItem, PayloadSize};
use std::hint::black_box;
use tokio_util::codec::Encoder;

static BODIES: &[TestBody] = &[
    TestBody::new("small_4k", 4 * 1024, 4 * 1024),
    TestBody::new("normal_64k_in_8k", 64 * 1024, 8 * 1024),
    TestBody::new("large_1m_in_16k", 1024 * 1024, 16 * 1024),
];

fn encode_body(mut encoder: PayloadEncoder, body: &TestBody, chunk: &Bytes, dst: &mut BytesMut) {
    for _ in 0..body.chunks() {
        encoder.encode(PayloadItem::Chunk(chunk.clone()), dst).expect("chunk should encode");
    }
    encoder.encode(PayloadItem::<Bytes>::Eof, dst).expect("eof should encode");
}

fn benchmark_payload_encoder(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("payload_encoder");

    for body in BODIES {
        let chunk = Bytes::from(vec![b'x'; body.chunk_size()]);
        group.throughput(Throughput::Bytes(body.size() as u64));

        for (name, size) in [("chunked", PayloadSize::Chunked), ("length", PayloadSize::Length(body.size() as u64))] {
            group.bench_with_input(BenchmarkId::new(name, body.name()), body, |b, body| {
                b.iter_batched_ref(
                    || BytesMut::with_capacity(body.size() + body.chunks() * 16),
                    |dst| {
                        encode_body(PayloadEncoder::from(size), body, &chunk, dst);
                        black_box(dst.len());
                    },
                    BatchSize::SmallInput,
                );
            });
        }
    }

    group.finish();
}

criterion_group!(payload, benchmark_payload_encoder);
criterion_main!(payload);
