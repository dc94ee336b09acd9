//! カタログ行の書式
//!
//! 照合済みレコードを光子シミュレータ用の固定書式に変換する。
//!
//! ```text
//! object <id>.<subindex> <ra> <dec> <magNorm> <sed> 0 0 0 0 0 0 point none CCM <A_V> <R_V>
//! ```
//!
//! 数値はすべて C の `%.9g` 相当（有効数字9桁）。

use crate::extinction::{ExtinctionMode, DEFAULT_R_V};
use crate::photometry::Band;
use crate::population::Population;
use crate::types::MatchResult;
use serde::{Deserialize, Serialize};

/// 有効数字
pub const SIGNIFICANT_DIGITS: usize = 9;

/// 赤方偏移・重力レンズ・位置オフセット・形状・内部減光（恒星は固定）
const FIXED_SOURCE_FIELDS: &str = "0 0 0 0 0 0 point none";

/// 非照合レコードの扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderPolicy {
    /// 出力しない
    #[default]
    Omit,
    /// `# <status> <id>` のコメント行を出す
    Comment,
}

/// C の `%.{precision}g` と同じ規則で整形
pub fn format_g(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let precision = precision.max(1);
    // 丸め後の指数を得るため一度指数表記にする
    let sci = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exponent < -4 || exponent >= precision as i32 {
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            if exponent < 0 { '-' } else { '+' },
            exponent.abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value))
    }
}

/// `%.9g`
pub fn format_g9(value: f64) -> String {
    format_g(value, SIGNIFICANT_DIGITS)
}

fn trim_fraction(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

/// カタログ行の書式設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineFormat {
    pub r_v: f64,
    /// SED名の前に付けるディレクトリ
    pub sed_prefix: String,
    pub placeholder: PlaceholderPolicy,
}

impl Default for LineFormat {
    fn default() -> Self {
        Self {
            r_v: DEFAULT_R_V,
            sed_prefix: "starSED".to_string(),
            placeholder: PlaceholderPolicy::Omit,
        }
    }
}

impl LineFormat {
    /// 照合済みレコードの行。照合済み以外は None
    pub fn emit(&self, result: &MatchResult<'_>) -> Option<String> {
        if !result.is_matched() {
            return None;
        }
        let record = result.record.as_ref()?;
        let template = result.template?;

        let position = record.position.normalized();
        let a_v = result.extinction.a_v;
        let mag_norm = record.photometry.dereddened_magnitude(Band::R, a_v) + template.norm_offset;

        let sed = if self.sed_prefix.is_empty() {
            template.name.clone()
        } else {
            format!("{}/{}", self.sed_prefix.trim_end_matches('/'), template.name)
        };

        Some(format!(
            "object {} {} {} {} {} {} CCM {} {}",
            result.object_id(),
            format_g9(position.ra_deg),
            format_g9(position.dec_deg),
            format_g9(mag_norm),
            sed,
            FIXED_SOURCE_FIELDS,
            format_g9(a_v),
            format_g9(self.r_v),
        ))
    }

    /// プレースホルダ行。ポリシーが Omit または照合済みなら None
    pub fn placeholder(&self, result: &MatchResult<'_>) -> Option<String> {
        if result.is_matched() || self.placeholder == PlaceholderPolicy::Omit {
            return None;
        }
        Some(format!("# {} {}", result.status, result.object_id()))
    }

    /// ヘッダ（コメント行）
    pub fn header_lines(&self, population: Population, mode: ExtinctionMode) -> Vec<String> {
        vec![
            "# star-sed catalog".to_string(),
            format!("# population: {}", population),
            format!("# extinction: {} (R_V = {})", mode, format_g9(self.r_v)),
            "# columns: object id ra dec magNorm sed redshift gamma1 gamma2 kappa dra ddec spatial internal_dust galactic_dust a_v r_v".to_string(),
        ]
    }
}
