//! ダストマップの読み込みと減光モデルの選択

use crate::catalog::open_text;
use crate::error::{Result, StarSedError};
use star_sed_common::{DustMap, ExponentialDisk, ExtinctionModel};
use std::path::Path;
use std::sync::Arc;

/// ダストマップJSON（gzip可）を読み込んで検証
pub fn load_dust_map(path: &Path) -> Result<DustMap> {
    let reader = open_text(path)?;
    let map: DustMap = serde_json::from_reader(reader)
        .map_err(|e| StarSedError::DustMap(format!("{}: {}", path.display(), e)))?;
    map.validate()
        .map_err(|e| StarSedError::DustMap(format!("{}: {}", path.display(), e)))?;
    Ok(map)
}

/// マップ指定があれば DustMap、無ければ指数円盤モデル
pub fn select_model(dust_map: Option<&Path>) -> Result<Arc<dyn ExtinctionModel>> {
    match dust_map {
        Some(path) => {
            let map = load_dust_map(path)?;
            log::info!("ダストマップ: {}", path.display());
            Ok(Arc::new(map))
        }
        None => {
            log::info!("ダストマップ未指定のため指数円盤モデルを使用");
            Ok(Arc::new(ExponentialDisk::default()))
        }
    }
}
