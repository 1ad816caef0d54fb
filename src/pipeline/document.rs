use std::path::{Path, PathBuf};

/// One PDF file scheduled for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Filesystem path.
    pub path: PathBuf,
    /// File name component, used in subjects, logs and the report.
    pub display_name: String,
    /// Size in bytes at discovery time.
    pub size_bytes: u64,
}

impl Document {
    /// Stat `path` and build a document for it.
    pub fn from_path(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let metadata = std::fs::metadata(&path)?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        Ok(Self {
            display_name: display_name(&path),
            size_bytes: metadata.len(),
            path,
        })
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// `true` when the file name ends in `.pdf`, any case.
pub fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}
