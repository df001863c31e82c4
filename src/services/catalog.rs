//! Category catalog: category name → extension set.
//!
//! The catalog is built once from the configured table, with the `all`
//! pseudo-category expanded up front. A [`CategorySelection`] is the frozen
//! lookup used during the walk; nothing here is mutated after construction.

use camino::Utf8Path;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Name of the pseudo-category covering every concrete category.
pub const ALL_CATEGORY: &str = "all";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("No categories selected")]
    EmptySelection,

    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}

#[derive(Debug, Clone)]
pub struct CategoryCatalog {
    /// Concrete categories followed by `all`, extensions normalized to `.ext`.
    categories: IndexMap<String, Vec<String>>,
}

impl CategoryCatalog {
    /// Build a catalog from a category table.
    ///
    /// Names and extensions are lowercased, extensions gain a leading dot if
    /// missing, and an `all` entry is derived from the union of the table. A
    /// user-supplied `all` entry is replaced.
    pub fn new(table: &IndexMap<String, Vec<String>>) -> Self {
        let mut categories: IndexMap<String, Vec<String>> = IndexMap::new();

        for (name, extensions) in table {
            let name = name.trim().to_lowercase();
            if name.is_empty() || name == ALL_CATEGORY {
                continue;
            }
            let slot = categories.entry(name).or_default();
            for ext in extensions.iter().filter_map(|e| normalize_extension(e)) {
                if !slot.contains(&ext) {
                    slot.push(ext);
                }
            }
        }

        let mut all: Vec<String> = categories.values().flatten().cloned().collect();
        all.sort();
        all.dedup();
        categories.insert(ALL_CATEGORY.to_string(), all);

        Self { categories }
    }

    /// Catalog built from the default table.
    pub fn builtin() -> Self {
        Self::new(&crate::models::default_file_categories())
    }

    pub fn extensions(&self, category: &str) -> Option<&[String]> {
        self.categories
            .get(&category.to_lowercase())
            .map(Vec::as_slice)
    }

    /// Freeze the lookup for the selected categories.
    ///
    /// When an extension appears in several selected categories, the first
    /// category in catalog order wins. Selecting `all` tags each file with its
    /// concrete category rather than `all`.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<CategorySelection, CatalogError> {
        let wanted: Vec<String> = names
            .iter()
            .map(|n| n.as_ref().trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();

        if wanted.is_empty() {
            return Err(CatalogError::EmptySelection);
        }

        for name in &wanted {
            if !self.categories.contains_key(name) {
                return Err(CatalogError::UnknownCategory(name.clone()));
            }
        }

        let select_all = wanted.iter().any(|n| n == ALL_CATEGORY);
        let mut by_suffix: HashMap<String, Arc<str>> = HashMap::new();

        for (name, extensions) in &self.categories {
            if name == ALL_CATEGORY || !(select_all || wanted.contains(name)) {
                continue;
            }
            let tag: Arc<str> = Arc::from(name.as_str());
            for ext in extensions {
                by_suffix.entry(ext.clone()).or_insert_with(|| tag.clone());
            }
        }

        if by_suffix.is_empty() {
            return Err(CatalogError::EmptySelection);
        }

        Ok(CategorySelection {
            names: wanted,
            by_suffix,
        })
    }
}

impl Default for CategoryCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Immutable extension lookup for one run.
#[derive(Debug, Clone)]
pub struct CategorySelection {
    names: Vec<String>,
    by_suffix: HashMap<String, Arc<str>>,
}

impl CategorySelection {
    /// Category of `path`, matched by lowercase extension suffix.
    ///
    /// Every suffix starting at a dot in the file name is tried, longest
    /// first, so compound extensions such as `.tar.gz` are honoured.
    pub fn classify(&self, path: &Utf8Path) -> Option<Arc<str>> {
        let name = path.file_name()?.to_lowercase();
        name.match_indices('.')
            .filter(|(idx, _)| *idx > 0)
            .find_map(|(idx, _)| self.by_suffix.get(&name[idx..]))
            .cloned()
    }

    /// Category names as configured.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

fn normalize_extension(raw: &str) -> Option<String> {
    let ext = raw.trim().to_lowercase();
    if ext.is_empty() || ext == "." {
        return None;
    }
    if ext.starts_with('.') {
        Some(ext)
    } else {
        Some(format!(".{}", ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, &[&str])]) -> IndexMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(name, exts)| {
                (
                    name.to_string(),
                    exts.iter().map(|e| e.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_all_is_union_of_categories() {
        let catalog = CategoryCatalog::new(&table(&[
            ("documents", &[".pdf", ".txt"]),
            ("images", &["JPG", ".png"]),
        ]));

        let all = catalog.extensions(ALL_CATEGORY).unwrap();
        assert_eq!(all, &[".jpg", ".pdf", ".png", ".txt"]);
        assert_eq!(catalog.extensions("images").unwrap(), &[".jpg", ".png"]);
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        let selection = CategoryCatalog::builtin().select(&["documents"]).unwrap();

        assert_eq!(
            selection.classify(Utf8Path::new("/data/Report.PDF")).as_deref(),
            Some("documents")
        );
        assert_eq!(
            selection.classify(Utf8Path::new("/data/notes.txt")).as_deref(),
            Some("documents")
        );
        assert!(selection.classify(Utf8Path::new("/data/photo.jpg")).is_none());
        assert!(selection.classify(Utf8Path::new("/data/Makefile")).is_none());
    }

    #[test]
    fn test_select_all_tags_concrete_category() {
        let selection = CategoryCatalog::builtin().select(&["all"]).unwrap();
        assert_eq!(
            selection.classify(Utf8Path::new("clip.mkv")).as_deref(),
            Some("videos")
        );
        assert_eq!(
            selection.classify(Utf8Path::new("a.zip")).as_deref(),
            Some("archives")
        );
    }

    #[test]
    fn test_compound_extension_matches() {
        let catalog = CategoryCatalog::new(&table(&[("backups", &[".tar.gz"])]));
        let selection = catalog.select(&["backups"]).unwrap();

        assert!(selection.classify(Utf8Path::new("dump.tar.gz")).is_some());
        assert!(selection.classify(Utf8Path::new("dump.gz")).is_none());
    }

    #[test]
    fn test_dotfile_without_extension_does_not_match() {
        let catalog = CategoryCatalog::new(&table(&[("text", &[".txt"])]));
        let selection = catalog.select(&["text"]).unwrap();
        assert!(selection.classify(Utf8Path::new(".txt")).is_none());
    }

    #[test]
    fn test_select_errors() {
        let catalog = CategoryCatalog::builtin();
        let none: [&str; 0] = [];
        assert_eq!(catalog.select(&none).unwrap_err(), CatalogError::EmptySelection);
        assert_eq!(
            catalog.select(&["spreadsheets"]).unwrap_err(),
            CatalogError::UnknownCategory("spreadsheets".into())
        );
    }

    #[test]
    fn test_first_category_wins_on_shared_extension() {
        let catalog = CategoryCatalog::new(&table(&[
            ("reports", &[".pdf"]),
            ("scans", &[".pdf", ".tiff"]),
        ]));
        let selection = catalog.select(&["scans", "reports"]).unwrap();
        assert_eq!(
            selection.classify(Utf8Path::new("q3.pdf")).as_deref(),
            Some("reports")
        );
        assert_eq!(
            selection.classify(Utf8Path::new("page.TIFF")).as_deref(),
            Some("scans")
        );
    }
}
