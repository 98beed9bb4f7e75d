// Static checks over the content tree: files, frontmatter, prerequisites, exercise references

use academy_common::content::{load_exercises, split_frontmatter, EXERCISES_FILE, LESSON_FILE};
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const REQUIRED_FRONTMATTER: &[&str] = &[
    "title",
    "order",
    "prerequisites",
    "estimatedMinutes",
    "pytorchVersion",
];

const EXERCISE_REF_PATTERN: &str = r#"<Exercise\s+id="([^"]+)""#;

/// Non-hidden subdirectories of `content_dir`, sorted by name
pub fn module_dirs(content_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(content_dir)
        .with_context(|| format!("Content directory '{}' not found", content_dir.display()))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if entry.file_type()?.is_dir() && !hidden {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

pub fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub struct ContentVerifier {
    module_ids: BTreeSet<String>,
    exercise_ref: Regex,
}

impl ContentVerifier {
    pub fn new(module_ids: BTreeSet<String>) -> Result<Self> {
        Ok(Self {
            module_ids,
            exercise_ref: Regex::new(EXERCISE_REF_PATTERN)?,
        })
    }

    /// `<Exercise id="...">` references in lesson order
    pub fn exercise_refs(&self, lesson: &str) -> Vec<String> {
        self.exercise_ref
            .captures_iter(lesson)
            .map(|c| c[1].to_string())
            .collect()
    }

    /// Every problem found in one module directory, each prefixed with the module id
    pub fn verify_module(&self, module_dir: &Path) -> Vec<String> {
        let module_id = dir_name(module_dir);
        let mut problems = Vec::new();
        let tag = |message: String| format!("[{}] {}", module_id, message);

        let lesson_path = module_dir.join(LESSON_FILE);
        let lesson = match fs::read_to_string(&lesson_path) {
            Ok(text) => text,
            Err(_) => {
                problems.push(tag(format!("Missing {}", LESSON_FILE)));
                return problems;
            }
        };

        let Some((yaml, _)) = split_frontmatter(&lesson) else {
            problems.push(tag("Missing frontmatter".to_string()));
            return problems;
        };
        let frontmatter: serde_yaml::Mapping = if yaml.trim().is_empty() {
            serde_yaml::Mapping::new()
        } else {
            match serde_yaml::from_str(yaml) {
                Ok(mapping) => mapping,
                Err(e) => {
                    problems.push(tag(format!("Invalid frontmatter: {}", e)));
                    return problems;
                }
            }
        };

        for field in REQUIRED_FRONTMATTER {
            if !frontmatter.contains_key(*field) {
                problems.push(tag(format!("Missing frontmatter field: {}", field)));
            }
        }

        let prerequisites = frontmatter
            .get("prerequisites")
            .and_then(|v| v.as_sequence())
            .map(|seq| seq.iter().filter_map(|v| v.as_str()).collect::<Vec<_>>())
            .unwrap_or_default();
        for prereq in prerequisites {
            if !self.module_ids.contains(prereq) {
                problems.push(tag(format!("Invalid prerequisite: {}", prereq)));
            }
        }

        let refs = self.exercise_refs(&lesson);
        let exercises_path = module_dir.join(EXERCISES_FILE);

        if exercises_path.exists() {
            match load_exercises(&exercises_path) {
                Ok(exercises) => {
                    for r in &refs {
                        if !exercises.contains_key(r) {
                            problems.push(tag(format!("Exercise referenced but not defined: {}", r)));
                        }
                    }
                    for id in exercises.keys() {
                        if !refs.contains(id) {
                            problems.push(tag(format!("Exercise defined but not used: {}", id)));
                        }
                    }
                }
                Err(e) => problems.push(tag(format!("Invalid {}: {:#}", EXERCISES_FILE, e))),
            }
        } else if !refs.is_empty() {
            problems.push(tag(format!("Exercises referenced but {} does not exist", EXERCISES_FILE)));
        }

        problems
    }
}

/// Verify every module under `content_dir`
pub fn verify_content(content_dir: &Path) -> Result<(usize, Vec<String>)> {
    let dirs = module_dirs(content_dir)?;
    let verifier = ContentVerifier::new(dirs.iter().map(|d| dir_name(d)).collect())?;

    let problems = dirs
        .iter()
        .flat_map(|dir| verifier.verify_module(dir))
        .collect();
    Ok((dirs.len(), problems))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const GOOD_LESSON: &str = "---\ntitle: Tensors\norder: 1\nprerequisites: []\nestimatedMinutes: 30\npytorchVersion: \"2.2\"\n---\n\n# Tensors\n\n<Exercise id=\"ex-1\" />\n";

    const GOOD_EXERCISES: &str = r#"{
        "ex-1": {
            "starter_code": "x = ...",
            "validation": {"type": "assert", "tests": ["assert x == 2"]},
            "solution": "x = 2"
        }
    }"#;

    fn write_module(root: &Path, id: &str, lesson: Option<&str>, exercises: Option<&str>) {
        let dir = root.join(id);
        fs::create_dir_all(&dir).unwrap();
        if let Some(lesson) = lesson {
            fs::write(dir.join(LESSON_FILE), lesson).unwrap();
        }
        if let Some(exercises) = exercises {
            fs::write(dir.join(EXERCISES_FILE), exercises).unwrap();
        }
    }

    #[test]
    fn test_clean_content_has_no_problems() {
        let root = TempDir::new().unwrap();
        write_module(root.path(), "01-tensors", Some(GOOD_LESSON), Some(GOOD_EXERCISES));

        let (count, problems) = verify_content(root.path()).unwrap();
        assert_eq!(count, 1);
        assert!(problems.is_empty(), "{:?}", problems);
    }

    #[test]
    fn test_missing_lesson() {
        let root = TempDir::new().unwrap();
        write_module(root.path(), "02-autograd", None, None);

        let (_, problems) = verify_content(root.path()).unwrap();
        assert_eq!(problems, vec!["[02-autograd] Missing lesson.mdx".to_string()]);
    }

    #[test]
    fn test_missing_fields_and_bad_prerequisite() {
        let root = TempDir::new().unwrap();
        let lesson = "---\ntitle: Autograd\nprerequisites: [01-tensors, 00-nowhere]\n---\nbody\n";
        write_module(root.path(), "01-tensors", Some(GOOD_LESSON), Some(GOOD_EXERCISES));
        write_module(root.path(), "05-autograd", Some(lesson), None);

        let (_, problems) = verify_content(root.path()).unwrap();
        assert!(problems.contains(&"[05-autograd] Missing frontmatter field: order".to_string()));
        assert!(problems.contains(&"[05-autograd] Missing frontmatter field: estimatedMinutes".to_string()));
        assert!(problems.contains(&"[05-autograd] Invalid prerequisite: 00-nowhere".to_string()));
        assert!(!problems.iter().any(|p| p.contains("01-tensors")));
    }

    #[test]
    fn test_exercise_reference_mismatches() {
        let root = TempDir::new().unwrap();
        let lesson = GOOD_LESSON.replace("ex-1", "ex-9");
        write_module(root.path(), "01-tensors", Some(&lesson), Some(GOOD_EXERCISES));

        let (_, problems) = verify_content(root.path()).unwrap();
        assert!(problems.contains(&"[01-tensors] Exercise referenced but not defined: ex-9".to_string()));
        assert!(problems.contains(&"[01-tensors] Exercise defined but not used: ex-1".to_string()));
    }

    #[test]
    fn test_references_without_exercises_file() {
        let root = TempDir::new().unwrap();
        write_module(root.path(), "01-tensors", Some(GOOD_LESSON), None);

        let (_, problems) = verify_content(root.path()).unwrap();
        assert_eq!(
            problems,
            vec!["[01-tensors] Exercises referenced but exercises.json does not exist".to_string()]
        );
    }

    #[test]
    fn test_invalid_exercises_file_reported() {
        let root = TempDir::new().unwrap();
        let exercises = r#"{"ex-1": {"starter_code": "", "validation": {"type": "fuzzy"}, "solution": ""}}"#;
        write_module(root.path(), "01-tensors", Some(GOOD_LESSON), Some(exercises));

        let (_, problems) = verify_content(root.path()).unwrap();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("Unknown validation type: fuzzy"));
    }

    #[test]
    fn test_hidden_dirs_skipped_and_missing_root_errors() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join(".cache")).unwrap();
        let (count, problems) = verify_content(root.path()).unwrap();
        assert_eq!(count, 0);
        assert!(problems.is_empty());

        assert!(verify_content(&root.path().join("absent")).is_err());
    }
}
