// src/render/catalog.rs
//! Template directories on disk. A directory with `template.html` (plus an
//! optional `list.html` item fragment) is a flat template; one with
//! `template.hbs` is structured. `template.html` wins when both exist.

use std::path::{Path, PathBuf};

use crate::config::{keys, Settings};
use crate::error::DispatchError;

pub const DEFAULT_TEMPLATE: &str = "default";
pub const FLAT_FILE: &str = "template.html";
pub const ITEM_FILE: &str = "list.html";
pub const STRUCTURED_FILE: &str = "template.hbs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    FlatHtml,
    Structured,
}

#[derive(Debug, Clone)]
pub struct TemplateSource {
    pub name: String,
    pub kind: TemplateKind,
    pub main: String,
    /// Item fragment for flat templates.
    pub item: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    /// Custom roots first, bundled root last.
    roots: Vec<PathBuf>,
    hide_bundled: bool,
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !name.starts_with('.')
}

fn kind_of(dir: &Path) -> Option<TemplateKind> {
    if dir.join(FLAT_FILE).is_file() {
        Some(TemplateKind::FlatHtml)
    } else if dir.join(STRUCTURED_FILE).is_file() {
        Some(TemplateKind::Structured)
    } else {
        None
    }
}

impl TemplateCatalog {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            hide_bundled: false,
        }
    }

    /// Hidden bundled templates stay usable only as the hardcoded fallback.
    pub fn hide_bundled(mut self, hide: bool) -> Self {
        self.hide_bundled = hide;
        self
    }

    fn searchable_roots(&self) -> &[PathBuf] {
        match (self.hide_bundled, self.roots.split_last()) {
            (true, Some((_, custom))) => custom,
            _ => &self.roots,
        }
    }

    fn locate_in(roots: &[PathBuf], name: &str) -> Option<(PathBuf, TemplateKind)> {
        if !is_valid_name(name) {
            return None;
        }
        roots.iter().find_map(|root| {
            let dir = root.join(name);
            kind_of(&dir).map(|k| (dir, k))
        })
    }

    pub fn is_available(&self, name: &str) -> bool {
        Self::locate_in(self.searchable_roots(), name).is_some()
    }

    /// Template names visible to operators, first root wins on duplicates.
    pub fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for root in self.searchable_roots() {
            let Ok(entries) = std::fs::read_dir(root) else {
                continue;
            };
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if is_valid_name(&name)
                    && kind_of(&entry.path()).is_some()
                    && !names.contains(&name)
                {
                    names.push(name);
                }
            }
        }
        names.sort();
        names
    }

    /// Explicit choice, then the language default, then the general one,
    /// then `default`. Unavailable choices are skipped.
    pub fn resolve_name(&self, explicit: Option<&str>, settings: &Settings, lang: &str) -> String {
        let from_lang = settings.text(&keys::template(lang));
        let general = settings.text(keys::TEMPLATE_GENERAL);
        let name = [explicit.map(str::trim), from_lang.as_deref(), general.as_deref()]
            .into_iter()
            .flatten()
            .find(|n| self.is_available(n))
            .unwrap_or(DEFAULT_TEMPLATE)
            .to_string();
        name
    }

    pub fn load(&self, name: &str) -> Result<TemplateSource, DispatchError> {
        let located = Self::locate_in(self.searchable_roots(), name).or_else(|| {
            (name == DEFAULT_TEMPLATE)
                .then(|| Self::locate_in(&self.roots, name))
                .flatten()
        });
        let Some((dir, kind)) = located else {
            return Err(DispatchError::Rendering(format!(
                "no renderable template named '{name}'"
            )));
        };
        let read = |file: &str| {
            std::fs::read_to_string(dir.join(file)).map_err(|e| {
                DispatchError::Rendering(format!("reading {}: {e}", dir.join(file).display()))
            })
        };
        let (main, item) = match kind {
            TemplateKind::FlatHtml => {
                if !dir.join(ITEM_FILE).is_file() {
                    return Err(DispatchError::Rendering(format!(
                        "flat template '{name}' has no {ITEM_FILE}"
                    )));
                }
                (read(FLAT_FILE)?, Some(read(ITEM_FILE)?))
            }
            TemplateKind::Structured => (read(STRUCTURED_FILE)?, None),
        };
        Ok(TemplateSource {
            name: name.to_string(),
            kind,
            main,
            item,
        })
    }
}
