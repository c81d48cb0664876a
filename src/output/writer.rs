//! On-disk layout of crawled resources
//!
//! ```text
//! <write-dir>/
//!   pdf/ html/ legal/ zip/ excel/ word/ powerpoint/ images/ cad/ else/
//!   _overview/          checkpoints and catalog snapshots
//! ```

use crate::resource::ResourceKind;
use std::io;
use std::path::{Path, PathBuf};

/// Reserved directory for crawl metadata
pub const OVERVIEW_DIR: &str = "_overview";

/// File name of the knowledge store checkpoint
pub const CHECKPOINT_FILE: &str = "knowledge_base.sqlite";

/// File name of the legal catalog snapshot
pub const CATALOG_FILE: &str = "legal_catalog.json";

/// Name used for URLs whose last path segment is empty
const INDEX_FILE_NAME: &str = "index";

/// State of the layout before [`OutputLayout::ensure`] ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutStatus {
    Created,
    Complete,
    Repaired,
}

/// Directory layout rooted at the write directory
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates every bucket directory plus the overview directory
    ///
    /// Missing directories of a partial layout are added; existing ones are left alone.
    pub fn ensure(&self) -> io::Result<LayoutStatus> {
        let mut wanted: Vec<PathBuf> = ResourceKind::all()
            .into_iter()
            .map(|kind| self.root.join(kind.bucket()))
            .collect();
        wanted.push(self.overview_dir());

        let missing: Vec<&PathBuf> = wanted.iter().filter(|dir| !dir.is_dir()).collect();

        let status = if missing.is_empty() {
            LayoutStatus::Complete
        } else if missing.len() == wanted.len() {
            LayoutStatus::Created
        } else {
            LayoutStatus::Repaired
        };

        for dir in missing {
            std::fs::create_dir_all(dir)?;
        }

        match status {
            LayoutStatus::Created => tracing::info!("Created output layout in {}", self.root.display()),
            LayoutStatus::Complete => tracing::debug!("Output layout in {} is complete", self.root.display()),
            LayoutStatus::Repaired => tracing::info!(
                "Output layout in {} was incomplete, added missing directories",
                self.root.display()
            ),
        }

        Ok(status)
    }

    /// Creates only the overview directory
    pub fn ensure_overview(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.overview_dir())
    }

    pub fn overview_dir(&self) -> PathBuf {
        self.root.join(OVERVIEW_DIR)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.overview_dir().join(CHECKPOINT_FILE)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.overview_dir().join(CATALOG_FILE)
    }

    /// Storage location of a resource
    pub fn location(&self, kind: ResourceKind, file_name: &str) -> PathBuf {
        let file_name = match file_name {
            "" => INDEX_FILE_NAME,
            name => name,
        };
        self.root.join(kind.bucket()).join(file_name)
    }

    /// Writes a resource body, replacing any previous file
    pub async fn write(&self, location: &Path, body: &[u8]) -> io::Result<()> {
        if let Some(parent) = location.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(location, body).await
    }
}
