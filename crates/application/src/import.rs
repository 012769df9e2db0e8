//! Sequential import of user-selected files into the library.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::Utc;
use libris_core::{BookFormat, BookId, BookLoader, BookRecord, LibraryError};

use crate::library::Library;

/// A file offered for import.
pub trait FileSource {
    fn name(&self) -> &str;
    fn size(&self) -> u64;
    fn read(&self) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct DiskFile {
    path: PathBuf,
    name: String,
    size: u64,
}

impl DiskFile {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let meta = std::fs::metadata(&path)
            .with_context(|| format!("stat {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            path,
            name,
            size: meta.len(),
        })
    }
}

impl FileSource for DiskFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read(&self) -> anyhow::Result<Vec<u8>> {
        std::fs::read(&self.path).with_context(|| format!("read {}", self.path.display()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: Vec<String>,
}

impl ImportReport {
    pub fn is_empty(&self) -> bool {
        self.imported == 0 && self.failed == 0 && self.skipped == 0
    }

    pub fn summary(&self) -> String {
        let mut text = format!("Imported {} book(s)", self.imported);
        if self.failed > 0 {
            text.push_str(&format!(", {} failed", self.failed));
        }
        if self.skipped > 0 {
            text.push_str(&format!(", {} skipped", self.skipped));
        }
        text
    }
}

/// Imports each file in turn. A failing file is recorded and the batch
/// continues; an unavailable store still fails every supported file.
pub fn import_files(
    library: &Library,
    loader: &dyn BookLoader,
    files: &[&dyn FileSource],
) -> ImportReport {
    let mut report = ImportReport::default();
    for file in files {
        let Some(format) = BookFormat::from_file_name(file.name()) else {
            tracing::info!(name = file.name(), "skipping unsupported file");
            report.skipped += 1;
            continue;
        };

        match import_one(library, loader, *file, format) {
            Ok(record) => {
                tracing::info!(id = %record.id, format = %format, "imported book");
                report.imported += 1;
            }
            Err(err) => {
                tracing::warn!(name = file.name(), error = %err, "import failed");
                report.failed += 1;
                report.failures.push(err.to_string());
            }
        }
    }
    report
}

fn import_one(
    library: &Library,
    loader: &dyn BookLoader,
    file: &dyn FileSource,
    format: BookFormat,
) -> Result<BookRecord, LibraryError> {
    let name = file.name();
    let parse_failure = |err: anyhow::Error| LibraryError::ParseFailure {
        name: name.to_string(),
        reason: format!("{err:#}"),
    };

    let bytes = file.read().map_err(parse_failure)?;
    let loaded = loader.load(name, format, bytes).map_err(parse_failure)?;

    let title = loaded
        .metadata
        .as_ref()
        .and_then(|m| m.title())
        .unwrap_or(name)
        .to_string();
    let record = BookRecord {
        id: BookId::from_file(name, file.size()),
        title,
        format,
        content: loaded.content,
        last_opened_at: Utc::now(),
        cover_image: loaded.cover.as_ref().map(|c| c.to_data_url()),
        metadata: loaded.metadata,
    };
    library.put(&record)?;
    Ok(record)
}
