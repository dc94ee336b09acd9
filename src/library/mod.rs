//! SEDテンプレートライブラリ
//!
//! CSV（gzip可）からテンプレートを読み込み、索引を構築・保存する。
//!
//! ```text
//! id,name,population,teff,logg,feh,u_g,g_r,r_i,i_z,norm_offset
//! 37,kurucz/km10_5750.fits_g40_5790,default,,,,1.21,0.45,0.16,0.05,0.0
//! ```

pub mod index_file;
pub mod names;

pub use index_file::{compute_file_fingerprint, IndexFile};

use crate::catalog::open_text;
use crate::error::{Result, StarSedError};
use serde::Deserialize;
use star_sed_common::{
    ColorVector, PhysicalParams, Population, PopulationRule, SpectralIndex, SpectralTemplate,
    TemplateId,
};
use std::io::Read;
use std::path::Path;

/// CSVの1行
#[derive(Debug, Deserialize)]
struct TemplateRow {
    id: TemplateId,
    name: String,
    population: String,
    teff: Option<f64>,
    logg: Option<f64>,
    feh: Option<f64>,
    u_g: f64,
    g_r: f64,
    r_i: f64,
    i_z: f64,
    #[serde(default)]
    norm_offset: Option<f64>,
}

impl TemplateRow {
    fn into_template(self, line: u64) -> Result<SpectralTemplate> {
        let population: Population = self
            .population
            .parse()
            .map_err(|e: String| StarSedError::InvalidLibrary(format!("{}行目: {}", line, e)))?;

        let params = match (self.teff, self.logg, self.feh) {
            (Some(teff), Some(logg), Some(feh)) => PhysicalParams { teff, logg, feh },
            (teff, logg, feh) => {
                let parsed = names::parse_params(&self.name).ok_or_else(|| {
                    StarSedError::InvalidLibrary(format!(
                        "{}行目: {} の物理パラメータが空欄で、名前からも読み取れません",
                        line, self.name
                    ))
                })?;
                PhysicalParams {
                    teff: teff.unwrap_or(parsed.teff),
                    logg: logg.unwrap_or(parsed.logg),
                    feh: feh.unwrap_or(parsed.feh),
                }
            }
        };

        Ok(SpectralTemplate {
            id: self.id,
            name: self.name,
            population,
            params,
            colors: ColorVector::new(self.u_g, self.g_r, self.r_i, self.i_z),
            norm_offset: self.norm_offset.unwrap_or(0.0),
        })
    }
}

/// ライブラリCSVを読み込む
pub fn load_library(path: &Path) -> Result<Vec<SpectralTemplate>> {
    let mut text = String::new();
    open_text(path)?.read_to_string(&mut text)?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(text.as_bytes());
    let headers = csv_reader.headers()?.clone();

    let mut templates = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |pos| record_line(&text, pos));
        let row: TemplateRow = record
            .deserialize(Some(&headers))
            .map_err(|e| StarSedError::InvalidLibrary(format!("{}行目: {}", line, e)))?;
        templates.push(row.into_template(line)?);
    }

    if templates.is_empty() {
        return Err(StarSedError::InvalidLibrary(format!(
            "テンプレートがありません: {}",
            path.display()
        )));
    }

    log::debug!("{} テンプレートを読み込み: {}", templates.len(), path.display());
    Ok(templates)
}

/// レコードが実際に始まる行番号
///
/// csv の位置は読み飛ばしたコメント行・空行の先頭を指すので、その分を進める。
fn record_line(text: &str, pos: &csv::Position) -> u64 {
    let mut line = pos.line();
    let start = usize::try_from(pos.byte()).unwrap_or(usize::MAX);
    for raw in text.get(start..).unwrap_or("").split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if !raw.is_empty() && !raw.starts_with('#') {
            break;
        }
        line += 1;
    }
    line
}

/// ライブラリを読み込んで索引を構築
pub fn build_index(library: &Path, rules: &[PopulationRule]) -> Result<SpectralIndex> {
    let templates = load_library(library)?;
    Ok(SpectralIndex::build_with_rules(templates, rules)?)
}

/// 照合に使う索引
#[derive(Debug)]
pub struct LoadedIndex {
    pub index: SpectralIndex,
    pub library_fingerprint: Option<String>,
    /// 索引ファイルから読んだか（false ならその場で構築）
    pub from_file: bool,
}

/// 索引ファイルがあれば読み込み、無ければライブラリから構築
///
/// 索引がライブラリより古い場合は警告のみ（`index --verify` で検査できる）。
/// 照合ルールが設定と異なる索引は使わず、ライブラリがあれば構築し直す。
pub fn open_index(
    index_path: Option<&Path>,
    library: &Path,
    rules: &[PopulationRule],
) -> Result<LoadedIndex> {
    if let Some(path) = index_path.filter(|p| p.exists()) {
        let file = IndexFile::load(path)?;
        if library.is_file() && file.is_stale(library)? {
            log::warn!(
                "索引 {} はライブラリ {} より古い可能性があります",
                path.display(),
                library.display()
            );
        }
        if file.index.templates().is_empty() {
            return Err(StarSedError::StaleIndex(format!("{} は空です", path.display())));
        }
        match file.check_rules(rules) {
            Ok(()) => {
                return Ok(LoadedIndex {
                    library_fingerprint: Some(file.library_fingerprint),
                    index: file.index,
                    from_file: true,
                });
            }
            Err(e) if library.is_file() => {
                log::warn!("{}: {}。ライブラリから構築します", path.display(), e);
            }
            Err(e) => return Err(e),
        }
    } else if let Some(path) = index_path {
        log::info!("索引 {} が無いためライブラリから構築します", path.display());
    }
    let fingerprint = compute_file_fingerprint(library)?;
    let index = build_index(library, rules)?;
    Ok(LoadedIndex {
        index,
        library_fingerprint: Some(fingerprint),
        from_file: false,
    })
}
