//! gzip カタログの書き出し
//!
//! `<output>.part` に書き、gzip の終端まで書けた時点で `<output>` へ改名する。
//! 中断時は `.part` のまま残す。

use crate::error::{Result, StarSedError};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct CatalogWriter {
    encoder: Option<GzEncoder<BufWriter<File>>>,
    part_path: PathBuf,
    final_path: PathBuf,
}

/// `<output>.part`
pub fn part_path_for(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

impl CatalogWriter {
    pub fn create(output: &Path) -> Result<Self> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| write_error(output, e))?;
            }
        }

        let part_path = part_path_for(output);
        let file = File::create(&part_path).map_err(|e| write_error(&part_path, e))?;
        Ok(Self {
            encoder: Some(GzEncoder::new(BufWriter::new(file), Compression::default())),
            part_path,
            final_path: output.to_path_buf(),
        })
    }

    pub fn write_line(&mut self, line: &str) -> Result<()> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| StarSedError::OutputWrite("writer already closed".into()))?;
        encoder
            .write_all(line.as_bytes())
            .and_then(|_| encoder.write_all(b"\n"))
            .map_err(|e| write_error(&self.part_path, e))
    }

    /// gzip を閉じて最終名に改名
    pub fn finish(mut self) -> Result<PathBuf> {
        self.close()?;
        std::fs::rename(&self.part_path, &self.final_path)
            .map_err(|e| write_error(&self.final_path, e))?;
        Ok(self.final_path.clone())
    }

    /// gzip を閉じて `.part` のまま残す
    pub fn abort(mut self) -> Result<PathBuf> {
        self.close()?;
        Ok(self.part_path.clone())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(encoder) = self.encoder.take() {
            let mut inner = encoder.finish().map_err(|e| write_error(&self.part_path, e))?;
            inner.flush().map_err(|e| write_error(&self.part_path, e))?;
        }
        Ok(())
    }
}

impl Drop for CatalogWriter {
    fn drop(&mut self) {
        if self.encoder.is_some() {
            if let Err(e) = self.close() {
                log::warn!("{} を閉じられませんでした: {}", self.part_path.display(), e);
            }
        }
    }
}

fn write_error(path: &Path, e: std::io::Error) -> StarSedError {
    StarSedError::OutputWrite(format!("{}: {}", path.display(), e))
}
