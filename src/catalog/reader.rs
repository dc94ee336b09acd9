//! 入力カタログの読み込み
//!
//! gzip（拡張子 `.gz`）と平文の両方を行単位でストリーム処理する。

use crate::error::{Result, StarSedError};
use flate2::read::GzDecoder;
use star_sed_common::{parse_star_line, InputColumns, InvalidLine, ParsedLine};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// 拡張子で gzip を判別してテキストとして開く
pub fn open_text(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    if !path.is_file() {
        return Err(StarSedError::FileNotFound(path.display().to_string()));
    }

    let file = File::open(path)?;
    if is_gzip(path) {
        Ok(Box::new(BufReader::new(GzDecoder::new(BufReader::new(file)))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

pub fn is_gzip(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// 入力カタログのチャンク読み込み
pub struct CatalogReader<R: BufRead> {
    reader: R,
    columns: InputColumns,
    buffer: Vec<u8>,
    line_no: u64,
    /// 読めた分を返した後に報告するエラー
    pending_error: Option<StarSedError>,
}

impl CatalogReader<Box<dyn BufRead + Send>> {
    pub fn open(path: &Path, columns: InputColumns) -> Result<Self> {
        Ok(Self::new(open_text(path)?, columns))
    }
}

impl<R: BufRead> CatalogReader<R> {
    pub fn new(reader: R, columns: InputColumns) -> Self {
        Self {
            reader,
            columns,
            buffer: Vec::new(),
            line_no: 0,
            pending_error: None,
        }
    }

    /// 最大 `chunk_size` 件のレコードを読む（空行・コメントは数えない）
    ///
    /// 終端では空の Vec を返す。UTF-8 でない行は不正レコードとして扱う。
    /// 読み込み・展開の失敗は InputRead で、失敗前に読めたレコードを
    /// 先に返してから次の呼び出しで報告する。
    pub fn next_chunk(&mut self, chunk_size: usize) -> Result<Vec<ParsedLine>> {
        if let Some(e) = self.pending_error.take() {
            return Err(e);
        }

        let mut chunk = Vec::with_capacity(chunk_size.min(65_536));

        while chunk.len() < chunk_size {
            self.buffer.clear();
            let read = match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(n) => n,
                Err(e) => {
                    let error =
                        StarSedError::InputRead(format!("{}行目: {}", self.line_no + 1, e));
                    if chunk.is_empty() {
                        return Err(error);
                    }
                    self.pending_error = Some(error);
                    break;
                }
            };
            if read == 0 {
                break;
            }
            self.line_no += 1;

            let parsed = match std::str::from_utf8(&self.buffer) {
                Ok(line) => parse_star_line(line, &self.columns),
                Err(_) => self.invalid_utf8_line(),
            };
            match parsed {
                ParsedLine::Skip => continue,
                parsed => chunk.push(parsed),
            }
        }

        Ok(chunk)
    }

    /// UTF-8 でない行。ID列が読めれば残す
    fn invalid_utf8_line(&self) -> ParsedLine {
        let lossy = String::from_utf8_lossy(&self.buffer);
        let id = match parse_star_line(&lossy, &self.columns) {
            ParsedLine::Skip => return ParsedLine::Skip,
            ParsedLine::Record(record) => Some(record.id),
            ParsedLine::Invalid(invalid) => invalid.id,
        };
        log::debug!("{}行目: invalid UTF-8", self.line_no);
        ParsedLine::Invalid(InvalidLine {
            id,
            reason: "invalid UTF-8".to_string(),
        })
    }
}
