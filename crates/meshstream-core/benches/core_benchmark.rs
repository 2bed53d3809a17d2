//! Benchmark tests for meshstream-core operations
//!
//! Run with: cargo bench -p meshstream-core

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use meshstream_core::decode_glb;
use meshstream_core::manifest::ManifestParser;
use meshstream_core::sync::evaluate;
use meshstream_core::types::*;

// ============================================================================
// Helpers
// ============================================================================

fn generate_manifest(segment_count: usize) -> String {
    let mut manifest = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static">
  <Period>
    <AdaptationSet>
      <Representation id="vol" mimeType="video/volumetric-video">
        <SEGINFO fps="30"/>
"#,
    );

    for i in 0..segment_count {
        manifest.push_str(&format!("        <GLBURL media=\"mesh/{:05}.glb\"/>\n", i));
    }

    manifest.push_str(
        r#"        <VAURL media="texture.mp4"/>
      </Representation>
    </AdaptationSet>
  </Period>
</MPD>"#,
    );
    manifest
}

fn generate_glb(mesh_count: usize, payload_len: usize) -> Bytes {
    let meshes: Vec<_> = (0..mesh_count)
        .map(|i| serde_json::json!({ "name": format!("m{}", i), "primitives": [{}] }))
        .collect();
    let mut json = serde_json::json!({ "meshes": meshes, "materials": [{ "name": "skin" }] })
        .to_string()
        .into_bytes();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let bin = vec![0u8; (payload_len + 3) & !3];

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(b"JSON");
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(b"BIN\0");
    out.extend_from_slice(&bin);
    Bytes::from(out)
}

// ============================================================================
// Manifest Benchmarks
// ============================================================================

fn bench_manifest_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Manifest Parsing");
    let parser = ManifestParser::new("https://cdn.example.com/vol");

    for &segment_count in &[30, 300, 3000] {
        let manifest = generate_manifest(segment_count);

        group.bench_with_input(
            BenchmarkId::new("parse", format!("{}_segments", segment_count)),
            &manifest,
            |b, manifest| {
                b.iter(|| black_box(parser.parse(black_box(manifest)).unwrap()));
            },
        );
    }

    group.finish();
}

// ============================================================================
// Decoder Benchmarks
// ============================================================================

fn bench_glb_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("GLB Decoding");

    for &(meshes, payload) in &[(1, 64 * 1024), (1, 1024 * 1024), (8, 1024 * 1024)] {
        let data = generate_glb(meshes, payload);

        group.bench_with_input(
            BenchmarkId::new("decode", format!("{}x{}KB", meshes, payload / 1024)),
            &data,
            |b, data| {
                b.iter(|| black_box(decode_glb(data.clone()).unwrap()));
            },
        );
    }

    group.finish();
}

// ============================================================================
// Sync Benchmarks
// ============================================================================

fn bench_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sync");

    group.bench_function("evaluate", |b| {
        b.iter(|| black_box(evaluate(black_box(300), black_box(301))));
    });

    group.bench_function("progress_fraction", |b| {
        let progress = LoadProgress {
            total_count: Some(300),
            current_count: 150,
            ..Default::default()
        };
        b.iter(|| black_box(progress.fraction()));
    });

    group.bench_function("state_transition_check", |b| {
        b.iter(|| {
            black_box(SessionState::SyncChecked.can_transition_to(black_box(SessionState::Ready)))
        });
    });

    group.finish();
}

criterion_group!(manifest_benches, bench_manifest_parsing);

criterion_group!(decoder_benches, bench_glb_decoding);

criterion_group!(sync_benches, bench_sync);

criterion_main!(manifest_benches, decoder_benches, sync_benches);
