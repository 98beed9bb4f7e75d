/// Content Store - Read-Only Curriculum Catalog
///
/// **Responsibility:**
/// Resolve module ids to modules and exercise ids to typed exercise specs.
///
/// **Layout on disk:**
/// ```text
/// content/
///   01-tensors/
///     lesson.mdx       (YAML frontmatter + lesson body)
///     exercises.json   (optional, map of exercise id -> spec)
/// ```
///
/// Everything is parsed once at load time. A malformed `exercises.json`
/// (bad JSON, unknown validation kind, missing kind-specific field) fails
/// the whole load with the offending path in the error, so bad content is
/// caught at startup instead of surfacing as an ERROR verdict later.

use crate::types::{Curriculum, ExerciseSpec, Module, ModuleMetadata, Section};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const LESSON_FILE: &str = "lesson.mdx";
pub const EXERCISES_FILE: &str = "exercises.json";

/// Read-only lookup used by the validator and the HTTP layer
pub trait ContentStore: Send + Sync {
    fn get_module(&self, module_id: &str) -> Option<Arc<Module>>;

    /// Module ids in directory-name order
    fn module_ids(&self) -> Vec<String>;

    fn curriculum(&self) -> Curriculum;

    fn get_exercise(&self, module_id: &str, exercise_id: &str) -> Option<ExerciseSpec> {
        self.get_module(module_id)?
            .exercises
            .get(exercise_id)
            .cloned()
    }
}

struct SectionDef {
    id: &'static str,
    title: &'static str,
    order: u32,
    first_module: u32,
    last_module: u32,
}

const SECTIONS: &[SectionDef] = &[
    SectionDef { id: "fundamentals", title: "Fundamentos", order: 1, first_module: 1, last_module: 4 },
    SectionDef { id: "autograd", title: "Autograd", order: 2, first_module: 5, last_module: 7 },
    SectionDef { id: "neural-networks", title: "Redes Neurais", order: 3, first_module: 8, last_module: 12 },
    SectionDef { id: "data-training", title: "Dados e Treinamento", order: 4, first_module: 13, last_module: 15 },
    SectionDef { id: "advanced", title: "Arquiteturas Avançadas", order: 5, first_module: 16, last_module: 20 },
];

const OTHER_SECTION: (&str, u32) = ("other", 99);
const UNORDERED_MODULE: u32 = 99;

fn section_for_order(module_order: u32) -> (&'static str, u32) {
    SECTIONS
        .iter()
        .find(|s| (s.first_module..=s.last_module).contains(&module_order))
        .map(|s| (s.id, s.order))
        .unwrap_or(OTHER_SECTION)
}

/// Order encoded in a module directory name (`01-tensors` -> 1)
pub fn module_order(module_id: &str) -> u32 {
    module_id
        .split('-')
        .next()
        .and_then(|prefix| prefix.parse().ok())
        .unwrap_or(UNORDERED_MODULE)
}

/// Split `---`-delimited frontmatter from the lesson body.
/// Returns `None` when the text has no frontmatter block.
pub fn split_frontmatter(text: &str) -> Option<(&str, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let rest = text.strip_prefix("---")?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

#[derive(Debug, Default, Deserialize)]
struct LessonFrontmatter {
    title: Option<String>,
    #[serde(default)]
    prerequisites: Vec<String>,
    #[serde(rename = "estimatedMinutes")]
    estimated_minutes: Option<u32>,
    #[serde(rename = "pytorchVersion")]
    pytorch_version: Option<String>,
}

/// In-memory catalog of modules, either loaded from disk or built directly
#[derive(Debug, Clone, Default)]
pub struct ContentCatalog {
    modules: BTreeMap<String, Arc<Module>>,
}

impl ContentCatalog {
    pub fn from_modules(modules: impl IntoIterator<Item = Module>) -> Self {
        let modules = modules
            .into_iter()
            .map(|m| (m.metadata.id.clone(), Arc::new(m)))
            .collect();
        Self { modules }
    }

    /// Load every module directory under `content_dir`.
    ///
    /// A missing content directory yields an empty catalog.
    pub fn load_dir(content_dir: &Path) -> Result<Self> {
        if !content_dir.exists() {
            warn!(
                content_dir = %content_dir.display(),
                "Content directory not found; serving an empty curriculum"
            );
            return Ok(Self::default());
        }

        let mut entries: Vec<_> = fs::read_dir(content_dir)
            .with_context(|| format!("Failed to read content directory {}", content_dir.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        entries.sort();

        let mut modules = Vec::new();
        for module_dir in entries {
            let Some(module_id) = module_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if module_id.starts_with('.') {
                continue;
            }
            if !module_dir.join(LESSON_FILE).exists() {
                debug!(module_id, "Skipping directory without {}", LESSON_FILE);
                continue;
            }
            modules.push(load_module(&module_dir, module_id)?);
        }

        let catalog = Self::from_modules(modules);
        info!(
            modules = catalog.modules.len(),
            exercises = catalog.modules.values().map(|m| m.exercises.len()).sum::<usize>(),
            "Content loaded"
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ContentStore for ContentCatalog {
    fn get_module(&self, module_id: &str) -> Option<Arc<Module>> {
        self.modules.get(module_id).cloned()
    }

    fn module_ids(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    fn curriculum(&self) -> Curriculum {
        let mut modules: Vec<&ModuleMetadata> =
            self.modules.values().map(|m| &m.metadata).collect();
        modules.sort_by_key(|m| m.order);

        // Modules outside the section table count toward totals but are not listed
        let sections = SECTIONS
            .iter()
            .filter_map(|def| {
                let members: Vec<ModuleMetadata> = modules
                    .iter()
                    .filter(|m| m.section == def.id)
                    .map(|m| (*m).clone())
                    .collect();
                (!members.is_empty()).then(|| Section {
                    id: def.id.to_string(),
                    title: def.title.to_string(),
                    order: def.order,
                    modules: members,
                })
            })
            .collect();

        Curriculum {
            sections,
            total_modules: modules.len() as u32,
            total_estimated_minutes: modules.iter().map(|m| m.estimated_minutes).sum(),
        }
    }
}

fn load_module(module_dir: &Path, module_id: &str) -> Result<Module> {
    let lesson_path = module_dir.join(LESSON_FILE);
    let lesson = fs::read_to_string(&lesson_path)
        .with_context(|| format!("Failed to read {}", lesson_path.display()))?;

    let (frontmatter, content) = match split_frontmatter(&lesson) {
        Some((yaml, body)) if !yaml.trim().is_empty() => {
            let parsed: LessonFrontmatter = serde_yaml::from_str(yaml)
                .with_context(|| format!("Invalid frontmatter in {}", lesson_path.display()))?;
            (parsed, body.to_string())
        }
        Some((_, body)) => (LessonFrontmatter::default(), body.to_string()),
        None => (LessonFrontmatter::default(), lesson.clone()),
    };

    let order = module_order(module_id);
    let (section, section_order) = section_for_order(order);

    let metadata = ModuleMetadata {
        id: module_id.to_string(),
        title: frontmatter.title.unwrap_or_else(|| module_id.to_string()),
        order,
        prerequisites: frontmatter.prerequisites,
        estimated_minutes: frontmatter.estimated_minutes.unwrap_or(30),
        pytorch_version: frontmatter.pytorch_version.unwrap_or_else(|| "2.2".to_string()),
        section: section.to_string(),
        section_order,
    };

    let exercises = load_exercises(&module_dir.join(EXERCISES_FILE))?;

    Ok(Module {
        metadata,
        content,
        exercises,
    })
}

/// Parse `exercises.json` into typed specs; a missing file means no exercises
pub fn load_exercises(path: &Path) -> Result<BTreeMap<String, ExerciseSpec>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut exercises: BTreeMap<String, ExerciseSpec> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    for (id, exercise) in exercises.iter_mut() {
        if exercise.id.is_empty() {
            exercise.id = id.clone();
        }
    }
    Ok(exercises)
}
