use anyhow::{Context, Error, Result};
use mime_guess::from_path;
use std::{
    fs::File as FsFile,
    path::{Path, PathBuf},
};
use tiny_http::{Header, Response};

/// Where the bytes of a cataloged file actually live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Remote(String),
}

#[derive(Clone, Debug)]
pub struct File {
    /// Base filename including the extension, e.g. `photo.jpg`.
    pub name: String,
    pub location: Location,
}

impl File {
    pub fn new<T: Into<String>>(name: T, location: Location) -> Self {
        Self {
            name: name.into(),
            location,
        }
    }

    /// Lower-cased extension with its leading dot, or `None` when the name has none.
    pub fn extension(&self) -> Option<String> {
        extension(&self.name).map(|extension| extension.to_lowercase())
    }

    pub fn stem(&self) -> &str {
        stem(&self.name)
    }
}

impl PartialEq for File {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.location == other.location
    }
}

/// Last segment of a `/`-separated path.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or_default()
}

/// Extension of the base name including the dot, in its original case.
///
/// Dotfiles such as `.env` and names ending in a bare dot have no extension.
pub fn extension(path: &str) -> Option<&str> {
    let base = base_name(path);
    let index = base.rfind('.').filter(|&index| index > 0)?;

    if index + 1 == base.len() {
        None
    } else {
        Some(&base[index..])
    }
}

/// Base name with its extension stripped.
pub fn stem(path: &str) -> &str {
    let base = base_name(path);

    match extension(base) {
        Some(extension) => &base[..base.len() - extension.len()],
        None => base,
    }
}

pub fn get_response(path: &Path) -> Result<Response<FsFile>> {
    let fs_file =
        FsFile::open(path).with_context(|| format!("Could not open {}", path.display()))?;
    let content_type = from_path(path).first_or_octet_stream();
    let header = Header::from_bytes("content-type", content_type.essence_str())
        .map_err(|_| Error::msg("Could not create header"))?;

    Ok(Response::from_file(fs_file).with_header(header))
}
