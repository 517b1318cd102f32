/// Performance benchmarks for the hit -> prediction pipeline
///
/// Run with: cargo bench
///
/// Thermodynamic refolding is switched off so the numbers measure the
/// parsing and coordinate work, not RNAfold.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tboxscan::features::locate_features;
use tboxscan::hit::HitRecord;
use tboxscan::infernal::parse_report;
use tboxscan::predict::{PredictConfig, TboxPredictor};
use tboxscan::resolver::resolve_structure;

const STRUCTURE: &str = ":::<<<<___>>>>,,,<<<<<<---->>>>>>:::";

/// Random residues for `STRUCTURE` with `UGG` placed after the dash run
fn synthetic_alignment(rng: &mut StdRng) -> String {
    let bases = [b'A', b'C', b'G', b'U'];
    let mut seq: Vec<u8> = (0..STRUCTURE.len())
        .map(|_| bases[rng.gen_range(0..4)])
        .collect();
    seq[27..30].copy_from_slice(b"UGG");
    String::from_utf8(seq).unwrap()
}

fn synthetic_hits(count: usize) -> Vec<HitRecord> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|i| HitRecord {
            name: format!("seq{}", i % 100),
            rank: i as u32 + 1,
            e_value: 1e-10,
            score: 40.0,
            bias: 0.1,
            start: 101,
            end: 136,
            cm_accuracy: 0.9,
            gc: 0.4,
            sequence: synthetic_alignment(&mut rng),
            structure: STRUCTURE.to_string(),
            parse_error: false,
        })
        .collect()
}

/// Render hits as a cmsearch report so the parser sees real block layout
fn synthetic_report(hits: &[HitRecord]) -> String {
    let mut text = String::from("# cmsearch :: search CM(s) against a sequence database\nHit alignments:\n");
    for hit in hits {
        let pad = " ".repeat(hit.name.len() + 8);
        text.push_str(&format!(">> {}\n", hit.name));
        text.push_str(" rank     E-value  score  bias mdl mdl from   mdl to       seq from      seq to       acc trunc   gc\n");
        text.push_str(" ----   --------- ------ ----- --- -------- --------    -------- --------      ---- -----  ----\n");
        text.push_str(&format!(
            "  ({}) !   1.0e-10   {:.1}   0.1  cm        1      36  []        {}      {} + ..    0.90    no 0.40\n\n",
            hit.rank, hit.score, hit.start, hit.end
        ));
        text.push_str(&format!("{pad}{} NC\n", " ".repeat(STRUCTURE.len())));
        text.push_str(&format!("{pad}{STRUCTURE} CS\n"));
        text.push_str(&format!("{pad}{}\n", hit.sequence.to_lowercase()));
        text.push_str(&format!("{pad}{}\n", hit.sequence));
        text.push_str(&format!("  {} {} {} {}\n", hit.name, hit.start, hit.sequence, hit.end));
        text.push_str(&format!("{pad}{} PP\n\n", "*".repeat(STRUCTURE.len())));
    }
    text.push_str("//\n");
    text
}

/// Benchmark: report text -> hit records
fn bench_report_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("report_parsing");

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.sample_size(10);

        let report = synthetic_report(&synthetic_hits(*size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &report, |b, report| {
            b.iter(|| parse_report(black_box(report)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark: landmark scan and structure cleanup for a single hit
fn bench_single_hit(c: &mut Criterion) {
    let hit = synthetic_hits(1).remove(0);
    let source: String = format!(
        "{}{}",
        "A".repeat(100),
        hit.sequence.replace('U', "T")
    );

    c.bench_function("locate_features", |b| {
        b.iter(|| locate_features(black_box(&hit.sequence), black_box(&hit.structure), 1))
    });
    c.bench_function("resolve_structure", |b| {
        b.iter(|| {
            resolve_structure(
                black_box(&source),
                hit.start,
                hit.end,
                black_box(&hit.sequence),
                black_box(&hit.structure),
            )
        })
    });
}

/// Benchmark: full prediction over many hits without a FASTA
fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict");
    let predictor = TboxPredictor::new(PredictConfig::default()).with_thermo(false);

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.sample_size(10);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter_with_setup(
                || synthetic_hits(size),
                |hits| predictor.predict(black_box(hits), None),
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_report_parsing, bench_single_hit, bench_predict);

criterion_main!(benches);
