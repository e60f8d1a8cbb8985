//! End-to-end batch runs over a temporary input directory.

use super::fakes::{settings, summary_prompts, template, FakeClient};
use crate::chunk::ChunkConfig;
use crate::orchestrator::{Pipeline, PipelineConfig, PipelinePrompts};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::source::{PlainTextSource, SourceRegistry};
use crate::summarize::{PartialPolicy, SummaryConfig};
use fable_core::AppError;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const STORY: &str = "Había una vez un oso polar que buscaba hielo.";

fn config() -> PipelineConfig {
    PipelineConfig {
        chunk: ChunkConfig::new(40, 10, vec![" ".to_string()]).unwrap(),
        summary: SummaryConfig {
            combine_budget: 1_000,
            max_concurrency: 2,
            partial_policy: PartialPolicy::Discard,
            max_collapse_depth: 4,
        },
        model: settings(),
        document_concurrency: 1,
        document_deadline: None,
        transform_retries: 0,
        image_prompts: false,
        image_prompt_count: 3,
    }
}

fn prompts() -> PipelinePrompts {
    PipelinePrompts {
        summary: summary_prompts(),
        story: template("story", "STORY:{{text}}"),
        image_prompts: template("images", "IMAGES {{count}}:{{text}}"),
    }
}

/// Summarizes anything, fails chunks mentioning FALLA, tells a fixed story
/// and answers image requests with `image_reply`.
fn client(image_reply: impl Fn() -> String + Send + Sync + 'static) -> FakeClient {
    FakeClient::new(move |prompt| {
        if prompt.starts_with("MAP:") {
            if prompt.contains("FALLA") {
                Err(AppError::Transport("503 Service Unavailable".to_string()))
            } else {
                Ok("resumen parcial".to_string())
            }
        } else if prompt.starts_with("COMBINE:") || prompt.starts_with("COLLAPSE:") {
            Ok("resumen final".to_string())
        } else if prompt.starts_with("STORY:") {
            Ok(STORY.to_string())
        } else {
            Ok(image_reply())
        }
    })
}

fn numbered(n: usize) -> String {
    (1..=n)
        .map(|i| format!("{}. Escena {}", i, i))
        .collect::<Vec<_>>()
        .join("\n")
}

struct Workspace {
    _dir: TempDir,
    input: std::path::PathBuf,
    output: std::path::PathBuf,
}

fn workspace(files: &[(&str, &str)]) -> Workspace {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("documents");
    let output = dir.path().join("stories");
    fs::create_dir_all(&input).unwrap();
    for (name, content) in files {
        fs::write(input.join(name), content).unwrap();
    }
    Workspace {
        _dir: dir,
        input,
        output,
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn test_batch_isolates_failing_documents() {
    let ws = workspace(&[
        ("a.txt", "El hielo del Ártico se derrite cada verano un poco más que el anterior."),
        ("b.txt", "Este documento FALLA al resumirse."),
        ("c.md", "no tiene lector"),
        ("vacio.txt", " \n\t "),
    ]);
    let client = Arc::new(client(|| numbered(3)));
    let pipeline = Pipeline::new(client, config(), prompts()).unwrap();

    let report = pipeline.run(&ws.input, &ws.output).await.unwrap();

    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.processed[0].path, ws.input.join("a.txt"));
    assert!(report.processed[0].chunks >= 2);
    assert_eq!(read(&ws.output.join("cuento_a.txt")), STORY);

    assert_eq!(report.failed.len(), 2);
    assert_eq!(report.failed[0].path, ws.input.join("b.txt"));
    assert_eq!(report.failed[0].kind, "transport");
    assert_eq!(report.failed[0].step.as_deref(), Some("map chunk 0"));
    assert_eq!(report.failed[1].path, ws.input.join("vacio.txt"));
    assert_eq!(report.failed[1].kind, "source_read");

    assert_eq!(report.skipped, vec![ws.input.join("c.md")]);
    assert!(!ws.output.join("cuento_b.txt").exists());
    assert!(report.has_failures());
}

#[tokio::test]
async fn test_image_prompts_follow_story() {
    let ws = workspace(&[("rio.txt", "El río Amazonas crece con las lluvias.")]);
    let client = Arc::new(client(|| numbered(3)));
    let mut config = config();
    config.image_prompts = true;
    let pipeline = Pipeline::new(client.clone(), config, prompts()).unwrap();

    let report = pipeline.run(&ws.input, &ws.output).await.unwrap();

    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.processed[0].outputs.len(), 2);
    assert_eq!(read(&ws.output.join("prompts_rio.txt")), numbered(3));

    // Image prompts are derived from the story, not the summary
    let image_prompts = client.prompts_with("IMAGES");
    assert_eq!(image_prompts, vec![format!("IMAGES 3:{}", STORY)]);
}

#[tokio::test]
async fn test_validation_failure_is_retried() {
    let ws = workspace(&[("rio.txt", "El río crece.")]);
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let client = Arc::new(client(move || {
        // First answer is one item short
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            numbered(2)
        } else {
            numbered(3)
        }
    }));
    let mut config = config();
    config.image_prompts = true;
    config.transform_retries = 1;
    let pipeline = Pipeline::new(client, config, prompts()).unwrap();

    let report = pipeline.run(&ws.input, &ws.output).await.unwrap();

    assert!(report.failed.is_empty());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(read(&ws.output.join("prompts_rio.txt")), numbered(3));
}

#[tokio::test]
async fn test_exhausted_retries_fail_document_without_partial_output() {
    let ws = workspace(&[("rio.txt", "El río crece.")]);
    let client = Arc::new(client(|| numbered(5)));
    let mut config = config();
    config.image_prompts = true;
    config.image_prompt_count = 6;
    let pipeline = Pipeline::new(client, config, prompts()).unwrap();

    let report = pipeline.run(&ws.input, &ws.output).await.unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].kind, "validation");
    assert_eq!(report.failed[0].step.as_deref(), Some("artifact 'image_prompts'"));
    assert!(!ws.output.join("cuento_rio.txt").exists());
}

#[tokio::test]
async fn test_failed_write_removes_earlier_outputs() {
    let ws = workspace(&[("rio.txt", "El río crece.")]);
    // A directory where the prompts file should go makes that write fail
    fs::create_dir_all(ws.output.join("prompts_rio.txt")).unwrap();
    let mut config = config();
    config.image_prompts = true;
    let pipeline = Pipeline::new(Arc::new(client(|| numbered(3))), config, prompts()).unwrap();

    let report = pipeline.run(&ws.input, &ws.output).await.unwrap();

    assert!(report.processed.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].kind, "write");
    assert!(!ws.output.join("cuento_rio.txt").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_dangling_link_is_reported_as_failure() {
    let ws = workspace(&[("a.txt", "El hielo se derrite.")]);
    std::os::unix::fs::symlink(ws.input.join("no_existe.txt"), ws.input.join("roto.txt")).unwrap();
    let pipeline = Pipeline::new(Arc::new(client(|| numbered(3))), config(), prompts()).unwrap();

    let report = pipeline.run(&ws.input, &ws.output).await.unwrap();

    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].path, ws.input.join("roto.txt"));
    assert_eq!(report.failed[0].kind, "source_read");
    assert!(report.skipped.is_empty());
}

#[tokio::test]
async fn test_scrape_results_become_a_story() {
    let ws = workspace(&[(
        "resultados_scraping_20240309_070501.txt",
        "Texto extraído de https://example.org:\nEl desierto avanza hacia el sur.",
    )]);
    let pipeline = Pipeline::new(Arc::new(client(|| numbered(3))), config(), prompts()).unwrap();

    let report = pipeline.run(&ws.input, &ws.output).await.unwrap();

    assert_eq!(report.processed.len(), 1);
    assert_eq!(
        read(&ws.output.join("cuento_resultados_scraping_20240309_070501.txt")),
        STORY
    );
}

#[tokio::test]
async fn test_shared_stems_get_distinct_outputs() {
    let ws = workspace(&[("informe.txt", "Texto uno."), ("informe.md", "Texto dos.")]);
    let mut registry = SourceRegistry::with_defaults();
    registry.register("md", Arc::new(PlainTextSource));
    let pipeline = Pipeline::new(Arc::new(client(|| numbered(3))), config(), prompts())
        .unwrap()
        .with_registry(registry);

    let report = pipeline.run(&ws.input, &ws.output).await.unwrap();

    assert_eq!(report.processed.len(), 2);
    assert!(ws.output.join("cuento_informe_txt.txt").exists());
    assert!(ws.output.join("cuento_informe_md.txt").exists());
}

#[tokio::test]
async fn test_documents_processed_concurrently() {
    let ws = workspace(&[
        ("a.txt", "uno"),
        ("b.txt", "dos"),
        ("c.txt", "tres"),
        ("d.txt", "cuatro"),
    ]);
    let mut config = config();
    config.document_concurrency = 3;
    let pipeline = Pipeline::new(Arc::new(client(|| numbered(3))), config, prompts()).unwrap();

    let report = pipeline.run(&ws.input, &ws.output).await.unwrap();

    let names: Vec<String> = report
        .processed
        .iter()
        .map(|d| d.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.txt", "b.txt", "c.txt", "d.txt"]);
}

#[tokio::test]
async fn test_empty_input_directory() {
    let ws = workspace(&[]);
    let pipeline = Pipeline::new(Arc::new(client(|| numbered(3))), config(), prompts()).unwrap();

    let report = pipeline.run(&ws.input, &ws.output).await.unwrap();
    assert!(report.is_empty());
    assert!(!ws.output.exists());
}

#[tokio::test]
async fn test_missing_input_directory_fails_run() {
    let ws = workspace(&[]);
    let pipeline = Pipeline::new(Arc::new(client(|| numbered(3))), config(), prompts()).unwrap();

    let err = pipeline
        .run(&ws.input.join("nope"), &ws.output)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "source_read");
}

#[tokio::test]
async fn test_retained_checkpoint_reported_for_failed_document() {
    let ws = workspace(&[("b.txt", "uno dos tres cuatro cinco seis siete ocho nueve diez FALLA once doce")]);
    let mut config = config();
    config.summary.partial_policy = PartialPolicy::Retain;
    config.summary.max_concurrency = 1;
    let pipeline = Pipeline::new(Arc::new(client(|| numbered(3))), config, prompts()).unwrap();

    let report = pipeline.run(&ws.input, &ws.output).await.unwrap();

    let failure = &report.failed[0];
    let checkpoint = failure.checkpoint.as_ref().unwrap();
    assert!(checkpoint.len() >= 2);
    assert!(checkpoint.completed() >= 1);
    assert!(!checkpoint.missing().is_empty());
}

#[tokio::test]
async fn test_progress_covers_every_phase() {
    let ws = workspace(&[("a.txt", "El hielo se derrite.")]);
    let phases = Arc::new(Mutex::new(Vec::new()));
    let sink = phases.clone();
    let reporter = ProgressReporter::new(Arc::new(move |event: ProgressEvent| {
        sink.lock().unwrap().push(event.phase);
    }));
    let pipeline = Pipeline::new(Arc::new(client(|| numbered(3))), config(), prompts())
        .unwrap()
        .with_progress(reporter);

    pipeline.run(&ws.input, &ws.output).await.unwrap();

    let phases = phases.lock().unwrap();
    for phase in ["discover", "read", "chunk", "map", "combine", "transform", "write"] {
        assert!(phases.iter().any(|p| p == phase), "missing phase {}", phase);
    }
}

#[tokio::test]
async fn test_report_serializes_for_json_output() {
    let ws = workspace(&[("a.txt", "Texto."), ("b.txt", "FALLA")]);
    let pipeline = Pipeline::new(Arc::new(client(|| numbered(3))), config(), prompts()).unwrap();

    let report = pipeline.run(&ws.input, &ws.output).await.unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["processed"][0]["modelCalls"], 2);
    assert_eq!(json["failed"][0]["kind"], "transport");
    assert!(json["failed"][0].get("checkpoint").is_none());
}
