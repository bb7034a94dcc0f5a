//! Directory of genome files.

use crate::error::{IoError, Result};
use crate::genome_text::{read_genome, write_genome};
use morphogen_data::Genome;
use std::path::{Path, PathBuf};

pub const GENOME_EXTENSION: &str = "genome";

/// Stores genomes as `<name>.genome` text files in one directory.
///
/// The genome's name is its key: saving a genome with an existing name
/// replaces the old file.
#[derive(Debug, Clone)]
pub struct GenomeStore {
    root: PathBuf,
}

impl GenomeStore {
    /// Opens `root`, creating it if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| {
            IoError::FileSystem(e).with_context(format!("creating genome store {:?}", root))
        })?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a genome of this name is stored at.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.trim().is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', ':'])
            && !name.chars().any(char::is_control);
        if !valid {
            return Err(IoError::validation(format!(
                "'{name}' cannot be used as a genome file name"
            )));
        }
        Ok(self.root.join(format!("{name}.{GENOME_EXTENSION}")))
    }

    /// Writes `genome` under its name. Returns the file path.
    pub fn save(&self, genome: &Genome) -> Result<PathBuf> {
        genome
            .validate()
            .map_err(|e| IoError::validation(format!("{e:#}")))?;
        let path = self.path_for(&genome.name)?;
        let tmp = path.with_extension("genome.tmp");
        std::fs::write(&tmp, write_genome(genome))
            .and_then(|()| std::fs::rename(&tmp, &path))
            .map_err(|e| IoError::FileSystem(e).with_context(format!("saving {:?}", path)))?;
        tracing::debug!(genome = %genome.name, path = %path.display(), "Saved genome");
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<Genome> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Err(IoError::not_found(format!("genome '{name}'")));
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|e| IoError::FileSystem(e).with_context(format!("reading {:?}", path)))?;
        let mut genome =
            read_genome(&text, name).map_err(|e| e.with_context(format!("parsing {:?}", path)))?;
        // the file name is the key
        genome.name = name.to_string();
        Ok(genome)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.path_for(name).is_ok_and(|p| p.is_file())
    }

    /// Deletes a stored genome. Returns whether it existed.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(IoError::FileSystem(e).with_context(format!("removing {:?}", path))),
        }
    }

    /// Names of all stored genomes, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            IoError::FileSystem(e).with_context(format!("listing {:?}", self.root))
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(GENOME_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
