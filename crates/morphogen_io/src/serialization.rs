//! Serialization utilities with robust error handling.
//!
//! Generic JSON and HexDNA (Base16-encoded JSON) helpers, plus
//! [`GenomeFormat`], which picks between those and the tagged text format
//! for whole genomes.

use crate::error::{IoError, Result};
use crate::genome_text;
use morphogen_data::Genome;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Serializes data to JSON with error handling.
pub fn to_json<T>(data: &T) -> Result<String>
where
    T: Serialize,
{
    serde_json::to_string(data)
        .map_err(|e| IoError::serialization(format!("JSON serialization failed: {}", e)))
}

/// Serializes data to pretty-printed JSON.
pub fn to_json_pretty<T>(data: &T) -> Result<String>
where
    T: Serialize,
{
    serde_json::to_string_pretty(data)
        .map_err(|e| IoError::serialization(format!("JSON serialization failed: {}", e)))
}

/// Deserializes data from a JSON string.
pub fn from_json<T>(json: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    if json.trim().is_empty() {
        return Err(IoError::validation("Empty JSON string"));
    }

    serde_json::from_str(json)
        .map_err(|e| IoError::serialization(format!("JSON deserialization failed: {}", e)))
}

/// Serializes data to HexDNA format (Base16-encoded JSON).
///
/// This is the compact, copy-paste friendly format for sharing genomes.
pub fn to_hex_dna<T>(data: &T) -> Result<String>
where
    T: Serialize,
{
    let json = to_json(data)?;
    Ok(hex::encode(json.as_bytes()))
}

/// Deserializes data from HexDNA format.
pub fn from_hex_dna<T>(hex_str: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    if hex_str.trim().is_empty() {
        return Err(IoError::validation("Empty hex string"));
    }

    let bytes = hex::decode(hex_str.trim())
        .map_err(|e| IoError::validation(format!("Invalid hex encoding: {}", e)))?;

    if bytes.is_empty() {
        return Err(IoError::validation("Decoded hex is empty"));
    }

    let json = String::from_utf8(bytes)
        .map_err(|e| IoError::validation(format!("Invalid UTF-8 in hex: {}", e)))?;

    from_json(&json)
}

/// Checks if a string is valid HexDNA format.
pub fn is_valid_hex_dna(hex_str: &str) -> bool {
    let trimmed = hex_str.trim();
    !trimmed.is_empty() && hex::decode(trimmed).is_ok()
}

/// Safely writes JSON to a file.
pub fn write_json_file<T, P>(data: &T, path: P) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let json = to_json_pretty(data)?;
    std::fs::write(&path, json).map_err(|e| {
        IoError::FileSystem(e).with_context(format!("writing JSON to {:?}", path.as_ref()))
    })?;
    Ok(())
}

/// Safely reads JSON from a file.
pub fn read_json_file<T, P>(path: P) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let json = std::fs::read_to_string(&path).map_err(|e| {
        IoError::FileSystem(e).with_context(format!("reading JSON from {:?}", path.as_ref()))
    })?;
    from_json(&json)
}

/// On-disk or on-clipboard representation of a genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenomeFormat {
    /// Tagged text tree, the primary format.
    Text,
    Json,
    Hex,
}

impl GenomeFormat {
    /// Guesses the format from the first non-blank character.
    #[must_use]
    pub fn detect(content: &str) -> Option<Self> {
        let trimmed = content.trim_start();
        match trimmed.chars().next()? {
            '<' => Some(Self::Text),
            '{' => Some(Self::Json),
            _ if is_valid_hex_dna(trimmed) => Some(Self::Hex),
            _ => None,
        }
    }

    /// Renders `genome` in this format.
    pub fn encode(self, genome: &Genome) -> Result<String> {
        match self {
            Self::Text => Ok(genome_text::write_genome(genome)),
            Self::Json => to_json_pretty(genome),
            Self::Hex => to_hex_dna(genome),
        }
    }

    /// Parses and validates a genome in this format.
    ///
    /// `fallback_name` only applies to text without a `<name>` tag.
    pub fn decode(self, content: &str, fallback_name: &str) -> Result<Genome> {
        let genome: Genome = match self {
            Self::Text => return genome_text::read_genome(content, fallback_name),
            Self::Json => from_json(content)?,
            Self::Hex => from_hex_dna(content)?,
        };
        genome
            .validate()
            .map_err(|e| IoError::validation(format!("{e:#}")))?;
        Ok(genome)
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Text => "genome",
            Self::Json => "json",
            Self::Hex => "hex",
        }
    }
}

impl fmt::Display for GenomeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Hex => "hex",
        })
    }
}

impl FromStr for GenomeFormat {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "genome" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "hex" | "hexdna" => Ok(Self::Hex),
            other => Err(IoError::validation(format!("unknown genome format '{other}'"))),
        }
    }
}

/// Reads a genome file in any supported format. The file stem names text
/// genomes that carry no `<name>`.
pub fn read_genome_file<P: AsRef<Path>>(path: P) -> Result<Genome> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        IoError::FileSystem(e).with_context(format!("reading genome from {:?}", path))
    })?;
    let format = GenomeFormat::detect(&content)
        .ok_or_else(|| IoError::validation(format!("{:?} is not a genome", path)))?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed");
    format
        .decode(&content, stem)
        .map_err(|e| e.with_context(format!("parsing {:?}", path)))
}
