use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use netmeter_protocol::message::PAYLOAD_FILL as FILL;
use netmeter_protocol::{MeasurementKind, Message, MessageCodec, SetupRequest};

fn bench_probe_encode(c: &mut Criterion) {
    let codec = MessageCodec::default();
    let message = Message::Probe {
        payload: Bytes::from(vec![FILL; 1000]),
        sequence: 42,
    };

    c.bench_function("probe_encode", |b| {
        b.iter(|| {
            let line = codec.encode(black_box(&message));
            black_box(line);
        });
    });
}

fn bench_probe_decode(c: &mut Criterion) {
    let codec = MessageCodec::default();
    let line = codec.encode(&Message::Probe {
        payload: Bytes::from(vec![FILL; 1000]),
        sequence: 42,
    });

    c.bench_function("probe_decode", |b| {
        b.iter(|| {
            let message = codec.decode(black_box(&line)).unwrap();
            black_box(message);
        });
    });
}

fn bench_setup_roundtrip(c: &mut Criterion) {
    let codec = MessageCodec::default();
    let message = Message::Setup(SetupRequest {
        kind: MeasurementKind::Tput,
        payload_size: 1000,
        probe_count: 100,
        server_delay_ms: 0,
    });

    c.bench_function("setup_roundtrip", |b| {
        b.iter(|| {
            let line = codec.encode(black_box(&message));
            let decoded = codec.decode(&line).unwrap();
            black_box(decoded);
        });
    });
}

criterion_group!(
    benches,
    bench_probe_encode,
    bench_probe_decode,
    bench_setup_roundtrip
);
criterion_main!(benches);
