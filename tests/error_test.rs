//! エラーケーステスト
//!
//! 各種エラー条件でのエラーハンドリングを検証

use star_sed_rust::error::StarSedError;
use star_sed_rust::{library, scanner};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// 存在しないフォルダをスキャンした場合
#[test]
fn test_scan_nonexistent_folder() {
    let result = scanner::scan_folder(Path::new("/nonexistent/path/12345"));
    assert!(result.is_err());

    let err = result.unwrap_err();
    assert!(matches!(err, StarSedError::FolderNotFound(_)));
}

/// 存在しない入力パス
#[test]
fn test_scan_inputs_missing_path() {
    let result = scanner::scan_inputs(&[PathBuf::from("/nonexistent/slice_000.txt.gz")]);
    assert!(matches!(result, Err(StarSedError::FileNotFound(_))));
}

/// 入力スライスのないフォルダ
#[test]
fn test_scan_folder_no_slices() {
    let dir = tempdir().expect("Failed to create temp dir");

    // 対象外の拡張子のみ
    std::fs::write(dir.path().join("notes.md"), "hello").unwrap();
    std::fs::write(dir.path().join("run.summary.json"), "{}").unwrap();

    let result = scanner::scan_folder(dir.path());
    assert!(result.is_ok());
    assert!(result.unwrap().is_empty());
}

/// StarSedErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        StarSedError::Config("テスト設定エラー".to_string()),
        StarSedError::MissingPopulation,
        StarSedError::FileNotFound("slice.txt.gz".to_string()),
        StarSedError::FolderNotFound("/path/to/folder".to_string()),
        StarSedError::InvalidLibrary("2行目".to_string()),
        StarSedError::StaleIndex("templates.csv".to_string()),
        StarSedError::DustMap("dustmap.json.gz".to_string()),
        StarSedError::InputRead("12行目".to_string()),
        StarSedError::OutputWrite("out.catalog.gz".to_string()),
        StarSedError::NoInputFound("フォルダ".to_string()),
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty(), "エラーメッセージが空: {:?}", err);
    }
}

/// MissingPopulationエラーのメッセージ確認
#[test]
fn test_missing_population_message() {
    let display = format!("{}", StarSedError::MissingPopulation);

    assert!(display.contains("母集団"));
    assert!(display.contains("--population"));
}

/// 索引バージョン不一致のメッセージ確認
#[test]
fn test_index_version_message() {
    let err = StarSedError::IndexVersion { found: 0, expected: 1 };
    let display = format!("{}", err);

    assert!(display.contains("ファイル: 0"));
    assert!(display.contains("対応: 1"));
    assert!(display.contains("build-index"));
}

/// 古いバージョンの索引ファイルを読み込んだ場合
#[test]
fn test_load_old_index_version() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("old.index.json");
    std::fs::write(&path, r#"{"version": 0, "templates": []}"#).unwrap();

    let result = library::IndexFile::load(&path);
    assert!(matches!(
        result,
        Err(StarSedError::IndexVersion { found: 0, expected: 1 })
    ));
}

/// 母集団名が不正なライブラリ
#[test]
fn test_library_unknown_population() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("templates.csv");
    std::fs::write(
        &path,
        "id,name,population,teff,logg,feh,u_g,g_r,r_i,i_z,norm_offset\n\
         1,t1,default,5000,4.5,0,1.2,0.4,0.1,0.05,0\n\
         2,t2,giant,5000,4.5,0,1.2,0.4,0.1,0.05,0\n",
    )
    .unwrap();

    let err = library::load_library(&path).unwrap_err();
    assert!(matches!(err, StarSedError::InvalidLibrary(_)));
    assert!(format!("{}", err).contains("3行目"));
}

/// エラーのDebug実装確認
#[test]
fn test_error_debug() {
    let err = StarSedError::Config("テスト".to_string());
    let debug = format!("{:?}", err);

    assert!(debug.contains("Config"));
    assert!(debug.contains("テスト"));
}

/// IOエラーからの変換
#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: StarSedError = io_err.into();

    assert!(matches!(err, StarSedError::Io(_)));
    let display = format!("{}", err);
    assert!(display.contains("IO"));
}

/// JSONエラーからの変換
#[test]
fn test_json_error_conversion() {
    let json_err = serde_json::from_str::<serde_json::Value>("{ invalid }").unwrap_err();
    let err: StarSedError = json_err.into();

    assert!(matches!(err, StarSedError::JsonParse(_)));
}

/// common::Errorからの変換
#[test]
fn test_common_error_conversion() {
    let common_err = star_sed_common::Error::IndexBuild("template collection is empty".to_string());
    let err: StarSedError = common_err.into();

    assert!(matches!(err, StarSedError::Common(_)));
}

/// エラーチェーン（透過的エラー）
#[test]
fn test_error_chain_transparent() {
    let common_err = star_sed_common::Error::Config("weights must be positive".to_string());
    let err: StarSedError = common_err.into();

    // 透過的エラーなのでメッセージがそのまま表示される
    assert_eq!(format!("{}", err), "Config error: weights must be positive");
}
