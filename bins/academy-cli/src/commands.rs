// CLI commands for content authors
use academy_common::config::Settings;
use academy_common::content::{ContentCatalog, ContentStore, LESSON_FILE};
use academy_common::types::{ExecutionRequest, ValidationOutcome};
use academy_engine::{Executor, ProcessEngine, Validator};
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::docs_version::VersionRewriter;
use crate::snippets::{preview, CellExtractor};
use crate::verify::{dir_name, module_dirs, verify_content};

/// Check structure and cross-references of the content tree.
/// Returns `false` when any problem was found.
pub fn verify(content_dir: &Path) -> Result<bool> {
    let (module_count, problems) = verify_content(content_dir)?;
    println!("Checking {} modules...\n", module_count);

    if problems.is_empty() {
        println!("✓ All modules verified successfully!");
        return Ok(true);
    }

    println!("PROBLEMS FOUND:");
    for problem in &problems {
        println!("  ✗ {}", problem);
    }
    println!("\nTotal: {} problems", problems.len());
    Ok(false)
}

/// Execute every lesson code cell and report the ones that fail
pub async fn run_snippets(settings: &Settings, content_dir: &Path, timeout_secs: u64) -> Result<bool> {
    let engine = Arc::new(ProcessEngine::new(&settings.engine));
    let executor = Executor::new(engine, settings.engine.preamble.clone());
    let extractor = CellExtractor::new()?;

    let mut total = 0usize;
    let mut failures: Vec<(String, String)> = Vec::new();

    for module_dir in module_dirs(content_dir)? {
        let lesson_path = module_dir.join(LESSON_FILE);
        if !lesson_path.exists() {
            continue;
        }
        let lesson = fs::read_to_string(&lesson_path)
            .with_context(|| format!("Failed to read {}", lesson_path.display()))?;
        let module_id = dir_name(&module_dir);

        for cell in extractor.extract(&lesson) {
            total += 1;
            let label = format!("{}/{}", module_id, cell.id);
            print!("Running {}... ", label);
            std::io::stdout().flush()?;

            let result = executor
                .execute(&ExecutionRequest::new(cell.code, timeout_secs))
                .await;
            if result.succeeded {
                println!("✓");
            } else {
                println!("✗");
                let detail = result
                    .error_message
                    .unwrap_or_else(|| result.stderr.clone());
                failures.push((label, detail));
            }
        }
    }

    println!("\n{}", "=".repeat(50));
    println!("Total: {} code cells", total);
    println!("Passed: {}", total - failures.len());
    println!("Failed: {}", failures.len());

    if !failures.is_empty() {
        println!("\nFAILURES:");
        for (label, detail) in &failures {
            println!("\n--- {} ---", label);
            println!("{}", preview(detail));
        }
    }

    Ok(failures.is_empty())
}

fn build_validator(settings: &Settings, content: Arc<dyn ContentStore>) -> Validator {
    let engine = Arc::new(ProcessEngine::new(&settings.engine));
    Validator::new(
        engine,
        content,
        settings.engine.preamble.clone(),
        settings.engine.validation_timeout_secs,
    )
}

/// Validate every exercise against its own reference solution
pub async fn check_solutions(settings: &Settings, content_dir: &Path) -> Result<bool> {
    let catalog = Arc::new(ContentCatalog::load_dir(content_dir)?);
    let validator = build_validator(settings, catalog.clone());

    let mut checked = 0usize;
    let mut broken = 0usize;

    for module_id in catalog.module_ids() {
        let Some(module) = catalog.get_module(&module_id) else {
            continue;
        };
        for (exercise_id, exercise) in &module.exercises {
            checked += 1;
            let verdict = validator.validate_exercise(exercise, &exercise.solution).await;
            if verdict.outcome == ValidationOutcome::Passed {
                println!("✓ {}/{}", module_id, exercise_id);
                continue;
            }

            broken += 1;
            println!(
                "✗ {}/{}: {} ({}/{})",
                module_id, exercise_id, verdict.outcome, verdict.passed_count, verdict.total_count
            );
            let detail = verdict.error_message.unwrap_or(verdict.feedback);
            if !detail.trim().is_empty() {
                println!("    {}", preview(detail.trim()).replace('\n', "\n    "));
            }
        }
    }

    println!("\nChecked {} solutions, {} failing", checked, broken);
    Ok(broken == 0)
}

/// Validate a single file against one exercise and print the verdict as JSON
pub async fn validate_file(
    settings: &Settings,
    content_dir: &Path,
    module_id: &str,
    exercise_id: &str,
    file: &Path,
) -> Result<bool> {
    let code = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let catalog = Arc::new(ContentCatalog::load_dir(content_dir)?);
    let validator = build_validator(settings, catalog);

    let verdict = validator.validate(module_id, exercise_id, &code).await;
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(verdict.is_passed())
}

/// Point every lesson at the given PyTorch documentation version
pub fn update_docs(content_dir: &Path, version: &str) -> Result<bool> {
    let rewriter = VersionRewriter::new()?;
    let mut updated = 0usize;

    for module_dir in module_dirs(content_dir)? {
        let lesson_path = module_dir.join(LESSON_FILE);
        if !lesson_path.exists() {
            continue;
        }
        let lesson = fs::read_to_string(&lesson_path)
            .with_context(|| format!("Failed to read {}", lesson_path.display()))?;

        if let Some(rewritten) = rewriter.rewrite(&lesson, version)? {
            fs::write(&lesson_path, rewritten)
                .with_context(|| format!("Failed to write {}", lesson_path.display()))?;
            println!("Updated: {}", lesson_path.display());
            updated += 1;
        }
    }

    println!("\nUpdated {} files to PyTorch {}", updated, version);
    Ok(true)
}
