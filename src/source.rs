//! Asset sources: where file bytes come from.
//!
//! The scene builder only sees [`AssetSource`]; an archive and a plain
//! directory of loose files are interchangeable behind it. Names use
//! backslash separators as they appear inside archives, and lookups are
//! case-insensitive.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use walkdir::WalkDir;

use crate::archive::AarArchive;
use crate::error::{Error, Result};
use crate::qnt::{self, Image};

pub trait AssetSource {
    fn exists(&self, name: &str) -> bool;

    /// Original-case names in source order.
    fn filenames(&self) -> Vec<String>;

    fn load(&mut self, name: &str) -> Result<Vec<u8>>;

    /// Load and decode one QNT image.
    fn load_image(&mut self, name: &str) -> Result<Image> {
        let data = self.load(name)?;
        qnt::decode(&data)
    }

    /// Resolve `base` (no extension) to an ordered animation set:
    /// `base.qnt`, then `base2.qnt`, `base3.qnt`, ... until a gap.
    fn load_image_list(&mut self, base: &str) -> Result<Vec<Image>> {
        let mut images = Vec::new();
        loop {
            let name = if images.is_empty() {
                format!("{base}.qnt")
            } else {
                format!("{}{}.qnt", base, images.len() + 1)
            };
            if !self.exists(&name) {
                break;
            }
            images.push(self.load_image(&name)?);
        }
        if images.is_empty() {
            return Err(Error::NotFound(base.to_owned()));
        }
        Ok(images)
    }
}

impl<R: std::io::Read + std::io::Seek> AssetSource for AarArchive<R> {
    fn exists(&self, name: &str) -> bool {
        AarArchive::exists(self, name)
    }

    fn filenames(&self) -> Vec<String> {
        AarArchive::filenames(self).map(str::to_owned).collect()
    }

    fn load(&mut self, name: &str) -> Result<Vec<u8>> {
        AarArchive::load(self, name)
    }
}

/// Loose files under a directory, for extracted data and tooling.
pub struct DirSource {
    /// Normalized name -> on-disk path, in scan order.
    files: IndexMap<String, PathBuf>,
    names: Vec<String>,
}

fn normalize(name: &str) -> String {
    name.to_lowercase().replace('\\', "/")
}

impl DirSource {
    pub fn new(root: &Path) -> Result<Self> {
        let mut files = IndexMap::new();
        let mut names = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(root)
                .expect("walkdir yields paths under root");
            // Present names the way archives do.
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("\\");
            files.insert(normalize(&name), entry.path().to_path_buf());
            names.push(name);
        }
        Ok(DirSource { files, names })
    }
}

impl AssetSource for DirSource {
    fn exists(&self, name: &str) -> bool {
        self.files.contains_key(&normalize(name))
    }

    fn filenames(&self) -> Vec<String> {
        self.names.clone()
    }

    fn load(&mut self, name: &str) -> Result<Vec<u8>> {
        let path = self
            .files
            .get(&normalize(name))
            .ok_or_else(|| Error::NotFound(name.to_owned()))?;
        Ok(fs::read(path)?)
    }
}
