//! Expands a CLI path argument into the list of Python source files to
//! audit. Grounded on the teacher's `fs::get_files`: gitignore-aware
//! directory walk via `ignore::WalkBuilder`, single files passed through
//! unchanged even if they don't match the extension filter.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

/// Directories that are never worth walking into even when not
/// gitignored, mirroring the teacher's `EXCLUDE_BUILTINS` list trimmed to
/// what a Python project tree actually has.
const EXCLUDE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "venv",
    ".venv",
    ".eggs",
    "site-packages",
    "__pycache__",
    ".mypy_cache",
    ".ruff_cache",
    "build",
    "dist",
];

/// Walks `root` (or passes it through if it's a single file) collecting
/// every `.py` file, skipping gitignored paths and the hard-coded
/// tooling-cache directories above.
pub fn discover_python_files(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }

    let mut builder = WalkBuilder::new(root);
    builder.standard_filters(true).hidden(false);
    builder.filter_entry(|entry| {
        entry
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| !EXCLUDE_DIRS.contains(&name))
            .unwrap_or(true)
    });

    builder
        .build()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("py"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_file_is_passed_through_even_without_py_extension() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "").unwrap();
        assert_eq!(discover_python_files(&file), vec![file]);
    }

    #[test]
    fn test_walks_directory_collecting_py_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("order.py"), "").unwrap();
        std::fs::write(dir.path().join("readme.md"), "").unwrap();
        std::fs::create_dir(dir.path().join("venv")).unwrap();
        std::fs::write(dir.path().join("venv").join("ignored.py"), "").unwrap();

        let mut found = discover_python_files(dir.path());
        found.sort();
        assert_eq!(found, vec![dir.path().join("order.py")]);
    }
}
