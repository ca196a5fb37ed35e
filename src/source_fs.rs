//! Filesystem adapter for [`DocumentTree`].

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::io::Read;
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::source::{DocumentTree, TreeFile};

/// A directory of source files, walked recursively in sorted order.
pub struct FsTree {
    root: PathBuf,
    label: String,
    follow_symlinks: bool,
    exclude: GlobSet,
}

impl FsTree {
    pub fn new(
        root: impl Into<PathBuf>,
        follow_symlinks: bool,
        exclude_globs: &[String],
    ) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            bail!("source root does not exist: {}", root.display());
        }

        let mut patterns = vec![
            "**/.git/**".to_string(),
            "**/target/**".to_string(),
            "**/node_modules/**".to_string(),
        ];
        patterns.extend(exclude_globs.iter().cloned());
        let exclude = build_globset(&patterns)?;

        let label = root.display().to_string();
        Ok(Self {
            root,
            label,
            follow_symlinks,
            exclude,
        })
    }
}

impl DocumentTree for FsTree {
    fn label(&self) -> &str {
        &self.label
    }

    fn enumerate(&self) -> Result<Vec<TreeFile>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if self.exclude.is_match(&rel_str) {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            let key = std::fs::canonicalize(path)
                .unwrap_or_else(|_| path.to_path_buf())
                .to_string_lossy()
                .to_string();
            let modified_ms = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|t| t.duration_since(std::time::SystemTime::UNIX_EPOCH).ok())
                .map_or(0, |d| d.as_millis() as i64);

            files.push(TreeFile {
                key,
                path: rel_str,
                name,
                modified_ms,
            });
        }

        Ok(files)
    }

    fn open(&self, file: &TreeFile) -> Result<Box<dyn Read + '_>> {
        Ok(Box::new(std::fs::File::open(&file.key)?))
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn enumerates_files_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("beta.txt"), "b").unwrap();
        fs::write(dir.path().join("alpha.txt"), "a").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/gamma.md"), "g").unwrap();

        let tree = FsTree::new(dir.path(), false, &[]).unwrap();
        let files = tree.enumerate().unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["alpha.txt", "beta.txt", "gamma.md"]);
    }

    #[test]
    fn exclude_globs_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.txt"), "k").unwrap();
        fs::create_dir(dir.path().join("drafts")).unwrap();
        fs::write(dir.path().join("drafts/skip.txt"), "s").unwrap();

        let tree = FsTree::new(dir.path(), false, &["drafts/**".to_string()]).unwrap();
        let files = tree.enumerate().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "keep.txt");
    }

    #[test]
    fn missing_root_is_an_error() {
        assert!(FsTree::new("/definitely/not/here", false, &[]).is_err());
    }

    #[test]
    fn open_reads_file_bytes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("doc.txt"), "payload").unwrap();

        let tree = FsTree::new(dir.path(), false, &[]).unwrap();
        let files = tree.enumerate().unwrap();
        let mut reader = tree.open(&files[0]).unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).unwrap();
        assert_eq!(content, "payload");
    }
}
