//! Build-target discovery.

use sheetwatch_monitor::{monitor::LOCK_FILE_PREFIX, MonitorConfig};
use std::path::PathBuf;
use walkdir::WalkDir;

/// The documents a batch build covers: every supported file under the
/// watch roots in `scan_all_mode`, otherwise the explicit manual list.
/// Sorted so build indices (and therefore resume records) are stable
/// across runs.
pub fn discover(config: &MonitorConfig) -> Vec<PathBuf> {
    if !config.scan_all_mode {
        return config.manual_targets.clone();
    }

    let mut targets = Vec::new();
    for root in &config.watch_dirs {
        for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let locked = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(LOCK_FILE_PREFIX));
            if locked || !config.is_supported(path) {
                continue;
            }
            targets.push(path.to_path_buf());
        }
    }
    targets.sort();
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_all_finds_supported_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
        for name in [
            "a.xlsx",
            "sub/b.xlsm",
            "sub/deeper/c.XLSX",
            "sub/ignored.txt",
            "~$a.xlsx",
        ] {
            fs::write(dir.path().join(name), b"stub").unwrap();
        }

        let config = MonitorConfig {
            watch_dirs: vec![dir.path().to_path_buf()],
            ..MonitorConfig::default()
        };
        let found = discover(&config);
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.xlsx", "b.xlsm", "c.XLSX"]);
    }

    #[test]
    fn manual_mode_returns_the_configured_list() {
        let config = MonitorConfig {
            scan_all_mode: false,
            manual_targets: vec![PathBuf::from("/srv/one.xlsx")],
            watch_dirs: vec![PathBuf::from("/srv")],
            ..MonitorConfig::default()
        };
        assert_eq!(discover(&config), [PathBuf::from("/srv/one.xlsx")]);
    }
}
