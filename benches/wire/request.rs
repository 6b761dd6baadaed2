use criterion::{BatchSize, Criterion, Throughput};
use libiot_ingest::wire::{
    BufferPolicy, Method, RandomSource, RequestHead, WireRequest, boundary, content_type,
};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::hint::black_box;

struct SeededRng(StdRng);

impl RandomSource for SeededRng {
    type Error = ();

    fn next_u32(&mut self) -> Result<u32, ()> {
        Ok(self.0.next_u32())
    }
}

fn rng() -> SeededRng {
    SeededRng(StdRng::seed_from_u64(0x1b07))
}

fn new_request(policy: BufferPolicy) -> WireRequest<SeededRng> {
    let head = RequestHead::new(Method::Post, "/iot/api/v2/messages", None)
        .expect("Failed to build head");
    let mut request = WireRequest::new(head, policy, rng()).expect("Failed to create request");
    request
        .add_header("Content-Type", content_type::MULTIPART_MIXED)
        .expect("Failed to add header");
    request
}

pub fn bench_boundary(c: &mut Criterion) {
    let mut rng = rng();
    c.bench_function("boundary/generate", |b| {
        b.iter(|| black_box(boundary::generate(&mut rng).expect("Failed to generate")))
    });
}

pub fn bench_singles(c: &mut Criterion) {
    let meta = br#"{"sensor":"t1","temp":21.5,"unit":"C"}"#;
    let mut group = c.benchmark_group("singles");
    group.throughput(Throughput::Bytes((meta.len() * 100) as u64));
    group.bench_function("100_into_16k", |b| {
        b.iter_batched(
            || new_request(BufferPolicy::resizable(16 * 1024)),
            |mut request| {
                for _ in 0..100 {
                    request
                        .add_single(content_type::JSON, "m1", meta)
                        .expect("Failed to add single");
                }
                request.finalize().expect("Failed to finalize");
                black_box(request.len())
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

pub fn bench_tuples(c: &mut Criterion) {
    let meta = br#"{"name":"frame.bin"}"#;
    let payload = vec![0xa5u8; 4096];
    let mut group = c.benchmark_group("tuples");
    group.throughput(Throughput::Bytes((payload.len() * 8) as u64));
    group.bench_function("8x4k_into_64k", |b| {
        b.iter_batched(
            || new_request(BufferPolicy::resizable(64 * 1024)),
            |mut request| {
                for _ in 0..8 {
                    request
                        .add_tuple(
                            "m2",
                            content_type::JSON,
                            meta,
                            content_type::OCTET_STREAM,
                            &payload,
                        )
                        .expect("Failed to add tuple");
                }
                request.finalize().expect("Failed to finalize");
                black_box(request.len())
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

pub fn bench_streamed_drain(c: &mut Criterion) {
    let payload = vec![0x5au8; 64 * 1024];
    let mut group = c.benchmark_group("streamed");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("64k_through_512", |b| {
        b.iter_batched(
            || new_request(BufferPolicy::fixed(512)),
            |mut request| {
                let mut sent = 0usize;
                request.begin_tuple("m1").expect("Failed to begin tuple");
                request
                    .begin_part(content_type::JSON)
                    .expect("Failed to begin part");
                request.append_raw(b"{}").expect("Failed to append");
                request.end_part().expect("Failed to end part");
                request
                    .begin_part(content_type::OCTET_STREAM)
                    .expect("Failed to begin part");
                for chunk in payload.chunks(256) {
                    if request.available_raw() < chunk.len() {
                        request
                            .drain_with(|bytes| {
                                sent += bytes.len();
                                Ok(())
                            })
                            .expect("Failed to drain");
                    }
                    request.append_raw(chunk).expect("Failed to append");
                }
                request.end_part().expect("Failed to end part");
                request.end_tuple().expect("Failed to end tuple");
                request.finalize().expect("Failed to finalize");
                request
                    .drain_with(|bytes| {
                        sent += bytes.len();
                        Ok(())
                    })
                    .expect("Failed to drain");
                black_box(sent)
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}
