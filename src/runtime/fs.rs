//! File system operations.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn create_dir_all_impl(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {:?}", path))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn create_file_impl(&self, path: &Path) -> Result<Box<dyn std::io::Write + Send>> {
        let file =
            fs::File::create(path).with_context(|| format!("Failed to create file {:?}", path))?;
        Ok(Box::new(std::io::BufWriter::new(file)))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn exists_impl(&self, path: &Path) -> bool {
        path.exists()
    }
}
