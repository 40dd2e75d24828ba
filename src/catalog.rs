use crate::file::{File, Location, extension};
use anyhow::{Context, Result};
use natord::compare_ignore_case;
use serde::Deserialize;
use std::{collections::HashMap, fs::read_to_string, path::Path};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Files from one source plus their extension index.
///
/// Built once at startup and never modified afterwards.
#[derive(Debug, Default)]
pub struct Catalog {
    files: Vec<File>,
    by_extension: HashMap<String, Vec<File>>,
}

impl Catalog {
    pub fn new(files: Vec<File>) -> Self {
        let by_extension = index_by_extension(&files);

        Self {
            files,
            by_extension,
        }
    }

    /// Catalog of every file under `root`, or an empty one if the tree cannot be walked.
    pub fn local(root: &Path) -> Self {
        match list_local_files(root) {
            Ok(files) => {
                info!("Cataloged {} files from {}", files.len(), root.display());
                Self::new(files)
            }
            Err(error) => {
                error!("Failed to list files from {}: {error:#}", root.display());
                Self::default()
            }
        }
    }

    /// Catalog of the assets listed in a manifest, or an empty one if it cannot be read.
    pub fn remote(manifest_path: &Path) -> Self {
        match list_remote_files(manifest_path) {
            Ok(files) => {
                info!(
                    "Cataloged {} assets from {}",
                    files.len(),
                    manifest_path.display(),
                );
                Self::new(files)
            }
            Err(error) => {
                error!(
                    "Failed to list assets from {}: {error:#}",
                    manifest_path.display(),
                );
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files sharing an extension. The lookup is case-insensitive.
    pub fn bucket(&self, extension: &str) -> Option<&[File]> {
        self.by_extension
            .get(&extension.to_lowercase())
            .map(Vec::as_slice)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&File> {
        self.files.iter().find(|file| file.name == name)
    }
}

#[derive(Deserialize)]
struct ManifestEntry {
    name: Option<String>,
    url: Option<String>,
}

/// Groups files by lower-cased extension, keeping input order within each group.
pub fn index_by_extension(files: &[File]) -> HashMap<String, Vec<File>> {
    let mut by_extension: HashMap<String, Vec<File>> = HashMap::new();

    for file in files {
        let Some(extension) = file.extension() else {
            continue;
        };

        by_extension.entry(extension).or_default().push(file.clone());
    }

    by_extension
}

pub fn list_local_files(root: &Path) -> Result<Vec<File>> {
    let mut files = vec![];
    let walker = WalkDir::new(root).sort_by(|a, b| {
        compare_ignore_case(&a.file_name().to_string_lossy(), &b.file_name().to_string_lossy())
    });

    for entry in walker {
        let entry = entry.with_context(|| format!("Could not walk {}", root.display()))?;

        // Symlinks are kept when they resolve to a file
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());

        if !is_file {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();

        if extension(&name).is_none() {
            debug!("Skipping {} without extension", entry.path().display());
            continue;
        }

        files.push(File::new(name, Location::Local(entry.into_path())));
    }

    Ok(files)
}

pub fn list_remote_files(manifest_path: &Path) -> Result<Vec<File>> {
    let contents = read_to_string(manifest_path)
        .with_context(|| format!("Could not read {}", manifest_path.display()))?;

    Ok(parse_manifest(&contents))
}

/// Parses a newline-delimited JSON manifest. Bad lines are logged and skipped.
pub fn parse_manifest(contents: &str) -> Vec<File> {
    let mut files = vec![];

    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        let entry = match serde_json::from_str::<ManifestEntry>(line) {
            Ok(entry) => entry,
            Err(error) => {
                warn!("Skipping manifest line {}: {error}: {line}", index + 1);
                continue;
            }
        };

        // Deletion records carry neither field
        let (Some(name), Some(url)) = (entry.name, entry.url) else {
            debug!("Skipping manifest line {} without name and url", index + 1);
            continue;
        };

        if extension(&name).is_none() {
            warn!("Skipping manifest asset {name} without extension");
            continue;
        }

        files.push(File::new(name, Location::Remote(url)));
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{create_dir_all, write};

    fn local(name: &str) -> File {
        File::new(name, Location::Local(name.into()))
    }

    #[test]
    fn lists_nested_files_with_extensions() {
        let dir = tempfile::tempdir().unwrap();
        create_dir_all(dir.path().join("img/v1.2")).unwrap();
        write(dir.path().join("index.html"), "").unwrap();
        write(dir.path().join("README"), "").unwrap();
        write(dir.path().join("img/b.png"), "").unwrap();
        write(dir.path().join("img/a.PNG"), "").unwrap();
        write(dir.path().join("img/v1.2/c.gif"), "").unwrap();

        let files = list_local_files(dir.path()).unwrap();
        let names = files
            .iter()
            .map(|file| file.name.as_str())
            .collect::<Vec<&str>>();

        assert_eq!(names, ["a.PNG", "b.png", "c.gif", "index.html"]);
        assert!(files.iter().all(|file| file.extension().is_some()));
        assert_eq!(
            files[0].location,
            Location::Local(dir.path().join("img").join("a.PNG")),
        );
    }

    #[cfg(unix)]
    #[test]
    fn keeps_symlinked_files() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("public");
        create_dir_all(&root).unwrap();
        create_dir_all(dir.path().join("outside")).unwrap();
        write(root.join("a.png"), "").unwrap();
        write(dir.path().join("outside/real.png"), "").unwrap();
        symlink(dir.path().join("outside/real.png"), root.join("b.png")).unwrap();
        symlink(dir.path().join("outside/gone.png"), root.join("broken.png")).unwrap();
        symlink(dir.path().join("outside"), root.join("linked.d")).unwrap();

        let files = list_local_files(&root).unwrap();
        let names = files
            .iter()
            .map(|file| file.name.as_str())
            .collect::<Vec<&str>>();

        assert_eq!(names, ["a.png", "b.png"]);
        assert_eq!(files[1].location, Location::Local(root.join("b.png")));
    }

    #[test]
    fn missing_directory_yields_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nope");

        assert!(list_local_files(&root).is_err());
        assert!(Catalog::local(&root).is_empty());
    }

    #[test]
    fn skips_bad_manifest_lines() {
        let manifest = concat!(
            "{not json\n",
            "{\"name\":\"x.jpg\",\"url\":\"https://example/x.jpg\"}\n",
        );
        let files = parse_manifest(manifest);

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "x.jpg");
        assert_eq!(
            files[0].location,
            Location::Remote("https://example/x.jpg".into()),
        );
    }

    #[test]
    fn skips_incomplete_manifest_entries() {
        let manifest = concat!(
            "{\"uuid\":\"1\",\"deleted\":true}\n",
            "{\"name\":\"a.png\"}\n",
            "{\"url\":\"https://example/b.png\"}\n",
            "\n",
            "{\"name\":\"noext\",\"url\":\"https://example/noext\"}\n",
            "{\"name\":\"c.png\",\"url\":\"https://example/c.png\",\"size\":3}\n",
            "[1, 2]\n",
            "{\"name\":\"d.png\",\"url\":\"https://example/d.png\"}",
        );
        let names = parse_manifest(manifest)
            .into_iter()
            .map(|file| file.name)
            .collect::<Vec<String>>();

        assert_eq!(names, ["c.png", "d.png"]);
    }

    #[test]
    fn unreadable_manifest_yields_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();

        assert!(Catalog::remote(&dir.path().join(".glitch-assets")).is_empty());
    }

    #[test]
    fn reads_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".glitch-assets");
        write(
            &path,
            "{\"name\":\"x.jpg\",\"url\":\"https://example/x.jpg\"}\n",
        )
        .unwrap();

        let catalog = Catalog::remote(&path);

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.bucket(".JPG").map(<[File]>::len), Some(1));
    }

    #[test]
    fn indexes_by_lower_cased_extension_in_order() {
        let files = vec![local("a.png"), local("b.JPG"), local("c.PNG"), local("d.jpg")];
        let index = index_by_extension(&files);

        assert_eq!(index.len(), 2);
        assert_eq!(index[".png"], [local("a.png"), local("c.PNG")]);
        assert_eq!(index[".jpg"], [local("b.JPG"), local("d.jpg")]);
        assert_eq!(index, index_by_extension(&files));
    }

    #[test]
    fn finds_exact_names() {
        let catalog = Catalog::new(vec![local("a.png"), local("b.png")]);

        assert_eq!(catalog.find_by_name("b.png"), Some(&local("b.png")));
        assert_eq!(catalog.find_by_name("B.png"), None);
        assert_eq!(catalog.bucket(".gif"), None);
    }
}
