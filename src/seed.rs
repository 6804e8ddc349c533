//! Bulk import of Gutendex metadata files from disk.

use anyhow::{Context, Result};
use gutenshelf_common::import::normalize;
use gutenshelf_common::{BookContent, NewBook};
use gutenshelf_storage::Storage;
use std::path::Path;
use tokio::fs;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub imported: usize,
    pub skipped: usize,
}

/// Upserts every `*.json` file in `meta_dir`, pointing each book's content at
/// `<content_dir>/<id>`. Unreadable or invalid files are logged and skipped;
/// storage failures abort the import.
pub async fn import_dir(storage: &Storage, meta_dir: &Path, content_dir: &Path) -> Result<SeedReport> {
    let mut files = Vec::new();
    let mut entries = fs::read_dir(meta_dir)
        .await
        .with_context(|| format!("failed to read {}", meta_dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    tracing::info!("Seeding {} metadata files from {}", files.len(), meta_dir.display());

    let mut report = SeedReport::default();
    for path in files {
        let book = match load(&path, content_dir).await {
            Ok(book) => book,
            Err(e) => {
                tracing::warn!("Skipping {}: {:#}", path.display(), e);
                report.skipped += 1;
                continue;
            }
        };
        storage
            .upsert_book(&book)
            .await
            .with_context(|| format!("failed to store book {}", book.gutenberg_id))?;
        tracing::debug!("Seeded book {} from {}", book.gutenberg_id, path.display());
        report.imported += 1;
    }

    tracing::info!(
        "Seeded {} books ({} files skipped)",
        report.imported,
        report.skipped
    );
    Ok(report)
}

async fn load(path: &Path, content_dir: &Path) -> Result<NewBook> {
    let raw = fs::read_to_string(path).await?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let mut book = normalize(value)?;

    let base_path = content_dir.join(book.gutenberg_id.to_string());
    let content = book.content.get_or_insert_with(BookContent::default);
    content.base_path = Some(base_path.to_string_lossy().into_owned());
    Ok(book)
}
