// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 目录扫描辅助函数

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 判断文件扩展名是否在列表中 (不区分大小写)
pub fn has_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|e| e.as_ref().eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// 列出目录下(不递归)扩展名匹配的文件, 按路径排序
pub fn list_files_with_extensions<S: AsRef<str>>(
    dir: &Path,
    extensions: &[S],
) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, extensions) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// 文件名主干 (不含扩展名)
pub fn file_stem(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_case_insensitive() {
        assert!(has_extension(Path::new("clip.MOV"), &["mov"]));
        assert!(has_extension(Path::new("a.jpg"), &["png", "JPG"]));
        assert!(!has_extension(Path::new("noext"), &["jpg"]));
    }

    #[test]
    fn test_list_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.jpg", "a.PNG", "c.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("d.jpg")).unwrap();
        let files = list_files_with_extensions(dir.path(), &["jpg", "png"]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.PNG", "b.jpg"]);
    }
}
