//! Criterion benchmarks for declbind-core.
//!
//! ## Benchmark groups
//!
//! 1. **prototype**: argument partitioning and prototype rendering.
//! 2. **classify**: classification plus hierarchy resolution.
//! 3. **generate**: full emission on synthetic models of growing size.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/declbind-core/Cargo.toml -- generate
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use declbind_core::codegen::Generator;
use declbind_core::config::GeneratorConfig;
use declbind_core::indexer::pipeline::build_model;
use declbind_core::models::{DeclBatch, DeclMember, DeclRecord, FuncVariant};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn member(ty: &str, name: &str, default: &str, mods: &[&str]) -> DeclMember {
    DeclMember {
        ty: ty.to_string(),
        name: name.to_string(),
        default_value: default.to_string(),
        modifiers: mods.iter().map(|m| m.to_string()).collect(),
    }
}

fn func_record(name: &str, members: Vec<DeclMember>) -> DeclRecord {
    DeclRecord {
        name: name.to_string(),
        base: "void".to_string(),
        members,
        rettype: Some("void".to_string()),
        ..Default::default()
    }
}

fn mixed_members(n: usize) -> Vec<DeclMember> {
    (0..n)
        .map(|i| match i % 4 {
            0 => member("Mat", &format!("src{i}"), "", &[]),
            1 => member("Mat", &format!("dst{i}"), "Mat()", &["/O"]),
            2 => member("int", &format!("flag{i}"), "0", &[]),
            _ => member("double", &format!("scale{i}"), "", &["/IO"]),
        })
        .collect()
}

/// `classes` algorithm-derived classes chained three deep, each with a
/// constructor, two overloaded methods and a constant, plus free functions.
fn synthetic_batch(classes: usize) -> DeclBatch {
    let mut decls = vec![DeclRecord {
        name: "class cv.Algorithm".to_string(),
        ..Default::default()
    }];
    for i in 0..classes {
        let base = match i % 3 {
            0 => ": cv::Algorithm".to_string(),
            _ => format!(": cv::Node{}", i - 1),
        };
        decls.push(DeclRecord {
            name: format!("class cv.Node{i}"),
            base,
            members: vec![member("int", "size", "", &["/RW"])],
            ..Default::default()
        });
        decls.push(func_record(&format!("cv.Node{i}.Node{i}"), mixed_members(2)));
        decls.push(func_record(&format!("cv.Node{i}.apply"), mixed_members(4)));
        decls.push(func_record(&format!("cv.Node{i}.apply"), mixed_members(6)));
        decls.push(DeclRecord {
            name: format!("const cv.Node{i}.KindValue{i}"),
            base: i.to_string(),
            ..Default::default()
        });
        decls.push(func_record(&format!("cv.process{i}"), mixed_members(5)));
    }
    DeclBatch {
        namespaces: vec!["cv".to_string()],
        headers: vec!["/src/include/opencv2/core.hpp".to_string()],
        decls,
    }
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_prototype(c: &mut Criterion) {
    let mut group = c.benchmark_group("prototype");
    let rules = GeneratorConfig::default().types;

    for &arity in &[2usize, 8, 32] {
        let decl = func_record("cv.f", mixed_members(arity));
        group.bench_with_input(BenchmarkId::new("variant", arity), &decl, |b, decl| {
            b.iter(|| {
                let v = FuncVariant::new("", "f", black_box(decl), false, false, &rules).unwrap();
                black_box(v.prototype.len())
            });
        });
    }

    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    let config = GeneratorConfig::default();

    for &classes in &[10usize, 100, 500] {
        let batch = synthetic_batch(classes);
        group.bench_with_input(BenchmarkId::new("build_model", classes), &batch, |b, batch| {
            b.iter(|| {
                let (model, _) = build_model(std::slice::from_ref(batch), &config).unwrap();
                black_box(model.funcs.len())
            });
        });
    }

    group.finish();
}

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    let config = GeneratorConfig::default();

    for &classes in &[10usize, 100, 500] {
        let (model, catalog) = build_model(&[synthetic_batch(classes)], &config).unwrap();
        group.bench_with_input(BenchmarkId::new("emit", classes), &model, |b, model| {
            b.iter_with_setup(
                || catalog.clone(),
                |catalog| {
                    let (sources, catalog) =
                        Generator::new(model, &config, catalog).generate().unwrap();
                    black_box((sources.funcs.len(), catalog.len()))
                },
            );
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Register all benchmark groups
// ---------------------------------------------------------------------------

criterion_group!(benches, bench_prototype, bench_classify, bench_generate);
criterion_main!(benches);
