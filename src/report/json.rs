use super::types::Report;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// `ux-analysis-<unix millis>.json`
pub fn default_file_name() -> String {
    format!("ux-analysis-{}.json", chrono::Utc::now().timestamp_millis())
}

/// Write the report document as received, pretty-printed.
/// A directory target gets the default file name.
pub fn save(report: &Report, output: &Path) -> Result<PathBuf> {
    let path = if output.is_dir() {
        output.join(default_file_name())
    } else {
        output.to_path_buf()
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(&report.raw)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_file_name() {
        let name = default_file_name();
        assert!(name.starts_with("ux-analysis-"));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn test_save_raw_document() {
        let dir = tempfile::tempdir().unwrap();
        let doc = json!({"summary": "ok", "suggestions": []});
        let report = Report::from_value(doc.clone()).unwrap();

        let path = save(&report, &dir.path().join("nested/report.json")).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, doc);
    }

    #[test]
    fn test_save_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let report = Report::from_value(json!({"summary": "ok"})).unwrap();

        let path = save(&report, dir.path()).unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.exists());
    }
}
