//! Generation pipeline: read batches, classify, resolve the hierarchy, emit
//! and save.
//!
//! Every fallible stage before `save_outputs` runs to completion first, so a
//! failed run never leaves partially written artifacts behind.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::codegen::Generator;
use crate::config::GeneratorConfig;
use crate::errors::{DeclbindError, DeclbindResult};
use crate::indexer::classifier::Classifier;
use crate::indexer::filesystem::expand_inputs;
use crate::indexer::hierarchy::resolve_hierarchy;
use crate::indexer::records::parse_batch;
use crate::models::{DeclBatch, DeclModel};
use crate::store::catalog::SignatureCatalog;
use crate::store::writer::save_outputs;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerationStats {
    pub inputs: usize,
    pub records: usize,
    pub classes: usize,
    pub functions: usize,
    pub namespaces: usize,
    pub written: usize,
    pub unchanged: usize,
    pub elapsed_ms: u128,
}

/// Read and decode every batch file, in order.
pub fn load_batches(paths: &[PathBuf]) -> DeclbindResult<Vec<DeclBatch>> {
    paths
        .iter()
        .map(|path| {
            let text = std::fs::read_to_string(path).map_err(|e| {
                DeclbindError::Input(format!("cannot read {}: {e}", path.display()))
            })?;
            let batch = parse_batch(&text, &path.display().to_string())?;
            debug!(path = %path.display(), records = batch.decls.len(), "loaded batch");
            Ok(batch)
        })
        .collect()
}

/// Classify all batches and resolve base classes.
pub fn build_model(
    batches: &[DeclBatch],
    config: &GeneratorConfig,
) -> DeclbindResult<(DeclModel, SignatureCatalog)> {
    let mut classifier = Classifier::new(config);
    for batch in batches {
        classifier.add_batch(batch)?;
    }
    let (mut model, catalog) = classifier.finish();
    resolve_hierarchy(&mut model)?;
    Ok((model, catalog))
}

/// Full run: inputs in, artifacts written under `output_dir`.
pub fn run_generation(
    output_dir: &Path,
    inputs: &[PathBuf],
    list_file: Option<&Path>,
    config: &GeneratorConfig,
) -> DeclbindResult<GenerationStats> {
    let start = Instant::now();

    let files = expand_inputs(inputs, list_file)?;
    if files.is_empty() {
        return Err(DeclbindError::Input("no declaration inputs given".to_string()));
    }
    let batches = load_batches(&files)?;
    let records = batches.iter().map(|b| b.decls.len()).sum();
    info!(inputs = files.len(), records, "declarations loaded");

    let (model, catalog) = build_model(&batches, config)?;
    info!(
        classes = model.classes.len(),
        functions = model.funcs.len(),
        namespaces = model.namespaces.len(),
        "model built"
    );

    let (sources, catalog) = Generator::new(&model, config, catalog).generate()?;
    let summary = save_outputs(output_dir, &config.output_prefix, &sources, &catalog)?;

    let stats = GenerationStats {
        inputs: files.len(),
        records,
        classes: model.classes.len(),
        functions: model.funcs.len(),
        namespaces: model.namespaces.len(),
        written: summary.written.len(),
        unchanged: summary.unchanged.len(),
        elapsed_ms: start.elapsed().as_millis(),
    };
    info!(elapsed_ms = stats.elapsed_ms as u64, "generation finished");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORE: &str = r#"{
        "namespaces": ["cv", "cv.ml"],
        "headers": ["/src/modules/core/include/opencv2/core.hpp"],
        "decls": [
            ["class cv.Algorithm", "", [], []],
            ["cv.Algorithm.clear", "void", [], [], "void", ""],
            ["class cv.ml.StatModel", ": cv::Algorithm", [], []],
            ["class cv.ml.SVM", ": cv::ml::StatModel", [], [["int", "degree", "", ["/RW"]]]],
            ["cv.ml.SVM.create", "Ptr_SVM", ["/S"], [], "Ptr<SVM>", ""],
            ["const cv.ml.SVM.LINEAR", "0", [], []],
            ["cv.add", "void", [], [["Mat", "src1", "", []], ["Mat", "src2", "", []], ["Mat", "dst", "Mat()", ["/O"]]], "void", "Adds."]
        ]
    }"#;

    #[test]
    fn test_end_to_end_generation() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("core.json");
        std::fs::write(&input, CORE).unwrap();
        let out = dir.path().join("out");

        let config = GeneratorConfig::default();
        let stats = run_generation(&out, &[input.clone()], None, &config).unwrap();
        assert_eq!(stats.inputs, 1);
        assert_eq!(stats.records, 7);
        assert_eq!(stats.classes, 3);
        assert_eq!(stats.written, 8);

        let include = std::fs::read_to_string(out.join("pyopencv_generated_include.h")).unwrap();
        assert_eq!(include, "#include \"opencv2/core.hpp\"\n");

        let catalog = std::fs::read_to_string(out.join("pyopencv_signatures.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&catalog).unwrap();
        assert!(parsed.get("cv::add").is_some());
        assert!(parsed.get("cv::ml::SVM").is_some());

        let again = run_generation(&out, &[input], None, &config).unwrap();
        assert_eq!(again.written, 0);
        assert_eq!(again.unchanged, 8);
    }

    #[test]
    fn test_svm_inherits_algorithm_through_chain() {
        let batch = parse_batch(CORE, "core").unwrap();
        let (model, _) = build_model(&[batch], &GeneratorConfig::default()).unwrap();
        assert_eq!(model.classes["ml_SVM"].base.as_deref(), Some("ml_StatModel"));
        assert!(model.classes["ml_SVM"].isalgorithm);
        assert!(!model.classes["Algorithm"].isalgorithm);
    }

    #[test]
    fn test_failed_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.json");
        std::fs::write(
            &input,
            r#"{"namespaces": ["cv"], "decls": [["class cv.Child", ": cv::Missing", [], []]]}"#,
        )
        .unwrap();
        let out = dir.path().join("out");
        let err = run_generation(&out, &[input], None, &GeneratorConfig::default()).unwrap_err();
        assert!(matches!(err, DeclbindError::UnresolvedBase { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn test_bare_array_input_uses_module_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bare.json");
        std::fs::write(
            &input,
            r#"[["const cv.FOO_BAR", "1", [], []], ["cv.add", "void", [], [["Mat", "a", "", []]]]]"#,
        )
        .unwrap();
        let out = dir.path().join("out");
        let stats = run_generation(&out, &[input], None, &GeneratorConfig::default()).unwrap();
        assert_eq!(stats.records, 2);

        let ns_reg = std::fs::read_to_string(out.join("pyopencv_generated_ns_reg.h")).unwrap();
        assert!(ns_reg.contains("{\"FOO_BAR\", static_cast<long>(cv::FOO_BAR)},"));
        assert!(ns_reg.contains("CV_PY_FN_WITH_KW_(pyopencv_cv_add, 0)"));
        let funcs = std::fs::read_to_string(out.join("pyopencv_generated_funcs.h")).unwrap();
        assert!(funcs.contains("ERRWRAP2(cv::add(a));"));
    }

    #[test]
    fn test_no_inputs_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_generation(dir.path(), &[], None, &GeneratorConfig::default()).unwrap_err();
        assert!(matches!(err, DeclbindError::Input(_)));
    }
}
