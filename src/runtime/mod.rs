//! Runtime abstraction for system operations.
//!
//! Environment and file system access goes through the [`Runtime`] trait so
//! the configuration and download steps can be tested without touching the
//! real process environment.
//!
//! # Structure
//!
//! - `env` - Environment variables and the scratch directory
//! - `fs` - File system operations

mod env;
mod fs;

use anyhow::Result;
use std::env as std_env;
use std::path::{Path, PathBuf};

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;
    fn temp_dir(&self) -> PathBuf;

    // File System
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn create_file(&self, path: &Path) -> Result<Box<dyn std::io::Write + Send>>;
    fn exists(&self, path: &Path) -> bool;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    fn temp_dir(&self) -> PathBuf {
        self.temp_dir_impl()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn create_file(&self, path: &Path) -> Result<Box<dyn std::io::Write + Send>> {
        self.create_file_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }
}
