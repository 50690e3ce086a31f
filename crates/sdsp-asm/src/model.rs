use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

use sdsp_rs::{Diagnostic, Encoded};

/// A loaded `.bin`: 32-bit words, most significant byte first.
#[derive(Debug, Clone)]
pub struct Image {
    /// Program address of the first word.
    pub base: u32,
    pub words: Vec<u32>,
}

pub fn words_from_bytes(bytes: &[u8]) -> Result<Vec<u32>> {
    anyhow::ensure!(
        bytes.len() % 4 == 0,
        "binary length {} is not a whole number of words",
        bytes.len()
    );
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

pub fn load_bin(path: &Path, base: u32) -> Result<Image> {
    let bytes = std::fs::read(path)?;
    Ok(Image { base, words: words_from_bytes(&bytes)? })
}

pub fn read_word(img: &Image, addr: u32) -> Option<u32> {
    let off = addr.checked_sub(img.base)?;
    img.words.get(off as usize).copied()
}

/// Writes `<stem>.bin`, `<stem>.lst` and `<stem>.mem`.
pub fn write_outputs(stem: &Path, enc: &Encoded) -> Result<Vec<PathBuf>> {
    let paths: Vec<PathBuf> = ["bin", "lst", "mem"]
        .iter()
        .map(|ext| stem.with_extension(ext))
        .collect();
    std::fs::write(&paths[0], &enc.bytes)?;
    std::fs::write(&paths[1], enc.listing_text())?;
    std::fs::write(&paths[2], enc.mem_image_text())?;
    Ok(paths)
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticOut {
    pub line: u32,
    pub addr: u32,
    pub kind: String,
    pub token: String,
    pub message: String,
}

impl From<&Diagnostic> for DiagnosticOut {
    fn from(d: &Diagnostic) -> Self {
        Self {
            line: d.line,
            addr: d.addr,
            kind: format!("{:?}", d.kind),
            token: d.token.clone(),
            message: d.message.clone(),
        }
    }
}

/// Summary printed with `--format json`.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub words: usize,
    pub errors: usize,
    pub diagnostics: Vec<DiagnosticOut>,
}
