use crate::error::{Result, StarSedError};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 入力スライス
#[derive(Debug, Clone)]
pub struct SliceInfo {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
}

const SLICE_EXTENSIONS: &[&str] = &["gz", "txt", "dat", "GZ", "TXT", "DAT"];

/// 入力パス（ファイルまたはフォルダ）から入力スライスを列挙
///
/// フォルダは直下のみを見て、ファイル名順に並べる。
/// ファイルは拡張子に関係なくそのまま採用する。
pub fn scan_inputs(inputs: &[PathBuf]) -> Result<Vec<SliceInfo>> {
    let mut slices = Vec::new();

    for input in inputs {
        if input.is_file() {
            slices.push(slice_info(input));
        } else if input.is_dir() {
            slices.extend(scan_folder(input)?);
        } else {
            return Err(StarSedError::FileNotFound(input.display().to_string()));
        }
    }

    Ok(slices)
}

pub fn scan_folder(folder: &Path) -> Result<Vec<SliceInfo>> {
    if !folder.exists() {
        return Err(StarSedError::FolderNotFound(folder.display().to_string()));
    }

    let mut slices = Vec::new();

    for entry in WalkDir::new(folder)
        .max_depth(1)  // 直下のみ（再帰しない）
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        if let Some(ext) = path.extension() {
            let ext_str = ext.to_string_lossy();
            if SLICE_EXTENSIONS.iter().any(|&e| e == ext_str) {
                slices.push(slice_info(path));
            }
        }
    }

    // ファイル名でソート
    slices.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    Ok(slices)
}

fn slice_info(path: &Path) -> SliceInfo {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    SliceInfo {
        path: path.to_path_buf(),
        file_name,
        size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_scan_folder_not_found() {
        let result = scan_folder(Path::new("/nonexistent/folder"));
        assert!(matches!(result, Err(StarSedError::FolderNotFound(_))));
    }

    #[test]
    fn test_scan_folder_filters_and_sorts() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("slice_b.txt.gz"), b"x").unwrap();
        fs::write(dir.path().join("slice_a.dat"), b"x").unwrap();
        fs::write(dir.path().join("slice_c.txt"), b"x").unwrap();
        fs::write(dir.path().join("notes.md"), b"x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("slice_d.txt"), b"x").unwrap();

        let slices = scan_folder(dir.path()).unwrap();
        let names: Vec<&str> = slices.iter().map(|s| s.file_name.as_str()).collect();
        assert_eq!(names, vec!["slice_a.dat", "slice_b.txt.gz", "slice_c.txt"]);
    }

    #[test]
    fn test_scan_inputs_mixed() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("single.cat");
        fs::write(&file, b"1 2 3").unwrap();
        let sub = dir.path().join("slices");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("s1.txt"), b"").unwrap();

        let slices = scan_inputs(&[file.clone(), sub]).unwrap();
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].path, file);
        assert_eq!(slices[0].size, 5);

        assert!(scan_inputs(&[dir.path().join("missing.txt")]).is_err());
    }
}
