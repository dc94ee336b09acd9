//! 入力カタログ行パーサー
//!
//! 外部のカタログ生成ツールが出力する空白区切りの行を
//! StarRecord に変換する。列の位置と単位は InputColumns で指定する。

use crate::error::{Error, Result};
use crate::photometry::Photometry;
use crate::types::{SkyPosition, StarRecord};
use serde::{Deserialize, Serialize};

/// 距離列の単位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    #[default]
    Pc,
    Kpc,
    /// 年周視差 [mas]
    ParallaxMas,
}

impl DistanceUnit {
    /// pc に換算（視差が 0 以下なら NaN）
    pub fn to_parsecs(&self, value: f64) -> f64 {
        match self {
            DistanceUnit::Pc => value,
            DistanceUnit::Kpc => value * 1000.0,
            DistanceUnit::ParallaxMas => {
                if value > 0.0 {
                    1000.0 / value
                } else {
                    f64::NAN
                }
            }
        }
    }
}

/// 角度列の単位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleUnit {
    #[default]
    Deg,
    Rad,
}

/// 入力行の列配置（0始まり）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputColumns {
    pub id: usize,
    pub ra: usize,
    pub dec: usize,
    pub distance: usize,
    pub u: usize,
    pub g: usize,
    pub r: usize,
    pub i: usize,
    pub z: usize,
    pub feh: Option<usize>,
    /// 計算済み A_V（列が無い行は未指定扱い）
    pub av: Option<usize>,
    pub distance_unit: DistanceUnit,
    pub angle_unit: AngleUnit,
}

impl Default for InputColumns {
    fn default() -> Self {
        Self {
            id: 0,
            ra: 1,
            dec: 2,
            distance: 3,
            u: 4,
            g: 5,
            r: 6,
            i: 7,
            z: 8,
            feh: Some(9),
            av: Some(10),
            distance_unit: DistanceUnit::Pc,
            angle_unit: AngleUnit::Deg,
        }
    }
}

impl InputColumns {
    fn required(&self) -> [(&'static str, usize); 9] {
        [
            ("id", self.id),
            ("ra", self.ra),
            ("dec", self.dec),
            ("distance", self.distance),
            ("u", self.u),
            ("g", self.g),
            ("r", self.r),
            ("i", self.i),
            ("z", self.z),
        ]
    }

    /// 列番号の重複を検出
    pub fn validate(&self) -> Result<()> {
        let mut used: Vec<(&str, usize)> = self.required().to_vec();
        if let Some(c) = self.feh {
            used.push(("feh", c));
        }
        if let Some(c) = self.av {
            used.push(("av", c));
        }
        for (n, (name, column)) in used.iter().enumerate() {
            if let Some((other, _)) = used[..n].iter().find(|(_, c)| c == column) {
                return Err(Error::Config(format!(
                    "input columns {} and {} both use column {}",
                    other, name, column
                )));
            }
        }
        Ok(())
    }

    /// 必須列を読むのに必要な列数
    pub fn min_columns(&self) -> usize {
        self.required().iter().map(|(_, c)| c + 1).max().unwrap_or(0)
    }
}

/// 読めなかった行
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidLine {
    /// ID列が読めた場合のみ
    pub id: Option<u64>,
    pub reason: String,
}

/// 1行のパース結果
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Record(StarRecord),
    Invalid(InvalidLine),
    /// 空行・コメント行
    Skip,
}

/// 入力行を1件パース
///
/// 空行と `#` で始まる行は Skip。列不足や数値でないフィールドは
/// Invalid になり、致命的エラーにはしない。
///
/// # Examples
/// ```
/// use star_sed_common::{parse_star_line, InputColumns, ParsedLine};
///
/// let line = "17 10.5 -3.25 1200 19.1 18.0 17.6 17.4 17.3 -0.5";
/// match parse_star_line(line, &InputColumns::default()) {
///     ParsedLine::Record(record) => assert_eq!(record.id, 17),
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
pub fn parse_star_line(line: &str, columns: &InputColumns) -> ParsedLine {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return ParsedLine::Skip;
    }

    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    let id = fields.get(columns.id).and_then(|s| s.parse::<u64>().ok());

    match build_record(&fields, columns) {
        Ok(record) => ParsedLine::Record(record),
        Err(e) => ParsedLine::Invalid(InvalidLine {
            id,
            reason: e.to_string(),
        }),
    }
}

fn build_record(fields: &[&str], columns: &InputColumns) -> Result<StarRecord> {
    if fields.len() < columns.min_columns() {
        return Err(Error::InvalidRecord(format!(
            "expected at least {} columns, found {}",
            columns.min_columns(),
            fields.len()
        )));
    }

    let id = fields[columns.id]
        .parse::<u64>()
        .map_err(|_| Error::InvalidRecord(format!("invalid id '{}'", fields[columns.id])))?;

    let ra = number(fields, columns.ra, "ra")?;
    let dec = number(fields, columns.dec, "dec")?;
    let position = match columns.angle_unit {
        AngleUnit::Deg => SkyPosition::new(ra, dec),
        AngleUnit::Rad => SkyPosition::from_radians(ra, dec),
    };

    let distance_pc = columns
        .distance_unit
        .to_parsecs(number(fields, columns.distance, "distance")?);

    let photometry = Photometry::new(
        number(fields, columns.u, "u")?,
        number(fields, columns.g, "g")?,
        number(fields, columns.r, "r")?,
        number(fields, columns.i, "i")?,
        number(fields, columns.z, "z")?,
    );

    let feh = match columns.feh {
        Some(c) if c < fields.len() => number(fields, c, "feh")?,
        _ => f64::NAN,
    };

    let av = match columns.av {
        Some(c) if c < fields.len() => optional_number(fields[c], "av")?,
        _ => None,
    };

    Ok(StarRecord {
        id,
        position,
        distance_pc,
        photometry,
        feh,
        av,
    })
}

fn number(fields: &[&str], column: usize, name: &str) -> Result<f64> {
    let raw = fields[column];
    raw.parse::<f64>()
        .map_err(|_| Error::InvalidRecord(format!("invalid {} '{}'", name, raw)))
}

/// `-` / `null` は未指定
fn optional_number(raw: &str, name: &str) -> Result<Option<f64>> {
    if raw == "-" || raw.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| Error::InvalidRecord(format!("invalid {} '{}'", name, raw)))
}
