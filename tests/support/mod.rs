//! Test support utilities for secret-rotator integration tests.
//!
//! Provides reusable test environment setup and helper commands.

#![allow(dead_code)]

pub mod assertions;
pub mod commands;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// Test environment with an isolated working directory.
///
/// All configured paths are relative, and child processes run with
/// `.current_dir()` set to the temp dir, so tests can run in parallel.
pub struct Test {
    pub dir: TempDir,
}

impl Test {
    /// Create an empty environment (no config).
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        Self { dir }
    }

    /// Create an environment with the standard job config written.
    pub fn with_jobs() -> Self {
        let t = Self::new();
        t.write_config(CONFIG_WITH_JOBS);
        t
    }

    /// Write `contents` as the configuration file.
    pub fn write_config(&self, contents: &str) {
        let path = self.config_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config/secret-rotator.toml")
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Files directly inside a directory under the test root, sorted.
    pub fn files_in(&self, relative: &str) -> Vec<PathBuf> {
        let dir = self.path(relative);
        if !dir.exists() {
            return Vec::new();
        }
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        files
    }
}
