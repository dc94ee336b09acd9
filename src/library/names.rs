//! テンプレート名から物理パラメータを読み取る
//!
//! - Kurucz: `km10_5750.fits_g40_5790` → [Fe/H] -1.0, Teff 5750, log g 4.0
//! - Bergeron: `bergeron_10000_75.dat_10100` → Teff 10000, log g 7.5
//! - MLT: `lte033-4.5-1.0a+0.4.BT-Settl.spec` → Teff 3300, log g 4.5, [Fe/H] -1.0

use regex::Regex;
use star_sed_common::PhysicalParams;

/// 名前の形式を判別してパラメータを返す（どれにも合わなければ None）
pub fn parse_params(name: &str) -> Option<PhysicalParams> {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    parse_kurucz(file_name)
        .or_else(|| parse_bergeron(file_name))
        .or_else(|| parse_mlt(file_name))
}

fn parse_kurucz(name: &str) -> Option<PhysicalParams> {
    lazy_static::lazy_static! {
        static ref KURUCZ_RE: Regex = Regex::new(r"^k([mp])(\d{2})_(\d+)\.fits_g(\d{2})").unwrap();
    }

    let cap = KURUCZ_RE.captures(name)?;
    let sign = if &cap[1] == "m" { -1.0 } else { 1.0 };
    let feh = sign * cap[2].parse::<f64>().ok()? / 10.0;
    let teff = cap[3].parse::<f64>().ok()?;
    let logg = cap[4].parse::<f64>().ok()? / 10.0;
    Some(PhysicalParams { teff, logg, feh })
}

fn parse_bergeron(name: &str) -> Option<PhysicalParams> {
    lazy_static::lazy_static! {
        static ref BERGERON_RE: Regex = Regex::new(r"^bergeron(?:_He)?_(\d+)_(\d{2})\.dat").unwrap();
    }

    let cap = BERGERON_RE.captures(name)?;
    let teff = cap[1].parse::<f64>().ok()?;
    let logg = cap[2].parse::<f64>().ok()? / 10.0;
    // 白色矮星モデルは金属量を持たない
    Some(PhysicalParams { teff, logg, feh: 0.0 })
}

fn parse_mlt(name: &str) -> Option<PhysicalParams> {
    lazy_static::lazy_static! {
        static ref MLT_RE: Regex = Regex::new(r"^lte(\d{3})-(\d\.\d)([+-]\d\.\d)a").unwrap();
    }

    let cap = MLT_RE.captures(name)?;
    let teff = cap[1].parse::<f64>().ok()? * 100.0;
    let logg = cap[2].parse::<f64>().ok()?;
    let feh = cap[3].parse::<f64>().ok()?;
    Some(PhysicalParams { teff, logg, feh })
}
