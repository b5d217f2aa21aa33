use anyhow::{ensure, format_err, Context, Result};
use indexmap::IndexSet;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// The file name of the persisted vocabulary.
pub const LABELS_FILE_NAME: &str = "labels.txt";

/// The ordered set of class names a model distinguishes.
///
/// The integer code of a class is its position in the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    classes: IndexSet<String>,
}

impl Vocabulary {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        ensure!(!names.is_empty(), "the vocabulary must not be empty");

        for name in &names {
            ensure!(!name.is_empty(), "class names must not be empty");
            ensure!(
                !name.contains('\n') && !name.contains('\r'),
                "class name {:?} must not contain line breaks",
                name
            );
        }

        let classes: IndexSet<String> = names.iter().cloned().collect();
        ensure!(
            classes.len() == names.len(),
            "duplicated class names found in {:?}",
            names
        );

        Ok(Self { classes })
    }

    /// Read a vocabulary written by [Vocabulary::save].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read labels file '{}'", path.display()))?;
        Self::new(text.lines())
            .with_context(|| format!("invalid labels file '{}'", path.display()))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains(name)
    }

    /// Map a class name to its integer code.
    pub fn encode(&self, name: &str) -> Result<usize> {
        self.classes
            .get_index_of(name)
            .ok_or_else(|| format_err!("label '{}' is not in the vocabulary", name))
    }

    /// Map an integer code back to its class name.
    pub fn decode(&self, index: usize) -> Option<&str> {
        self.classes.get_index(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }

    /// One class per line, no trailing line break.
    pub fn to_text(&self) -> String {
        self.classes
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Write the vocabulary to `labels.txt` under `dir`.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(LABELS_FILE_NAME);
        self.save_as(&path)?;
        Ok(path)
    }

    /// Write the vocabulary to the file at `path`.
    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_text())
            .with_context(|| format!("failed to write labels file '{}'", path.display()))?;
        Ok(())
    }
}
