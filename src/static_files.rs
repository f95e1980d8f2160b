use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

/// Content type used when neither the configured map nor the built-in table
/// knows an extension.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// File extension → content type.
///
/// Configured entries take precedence over a small built-in table.
#[derive(Debug, Clone, Default)]
pub struct MimeMap {
    types: HashMap<String, String>,
}

impl MimeMap {
    /// Add an entry; the extension is stored lower-case without a leading dot.
    pub fn insert(&mut self, extension: &str, content_type: &str) {
        self.types.insert(
            extension.trim().trim_start_matches('.').to_ascii_lowercase(),
            content_type.trim().to_string(),
        );
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Content type for a file path, by its last extension.
    #[must_use]
    pub fn lookup(&self, path: &Path) -> &str {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if let Some(content_type) = self.types.get(&ext) {
            return content_type;
        }
        match ext.as_str() {
            "html" | "htm" => "text/html",
            "css" => "text/css",
            "js" => "application/javascript",
            "json" => "application/json",
            "txt" => "text/plain",
            "svg" => "image/svg+xml",
            "png" => "image/png",
            _ => FALLBACK_CONTENT_TYPE,
        }
    }
}

/// A file read for a static route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticAsset {
    pub path: PathBuf,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Serves regular files from under one root directory.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    base_dir: PathBuf,
    mime: MimeMap,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(base: P, mime: MimeMap) -> Self {
        Self {
            base_dir: base.into(),
            mime,
        }
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Map a URL path under the root. Percent-escapes are decoded first;
    /// anything that would leave the root yields `None`.
    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let decoded = urlencoding::decode(url_path).ok()?;
        if decoded.contains('\\') || decoded.contains('\0') {
            return None;
        }
        let mut pb = self.base_dir.clone();
        for comp in Path::new(decoded.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    /// Read the file behind `url_path`.
    ///
    /// Only regular files count: directories and symbolic links are reported
    /// as not found, like missing files.
    pub fn load(&self, url_path: &str) -> io::Result<StaticAsset> {
        let path = self
            .map_path(url_path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "invalid path"))?;
        let meta = fs::symlink_metadata(&path)?;
        if !meta.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "not a regular file"));
        }
        let bytes = fs::read(&path)?;
        let content_type = self.mime.lookup(&path).to_string();
        debug!(
            path = %path.display(),
            content_type = %content_type,
            size_bytes = bytes.len(),
            "Static asset loaded"
        );
        Ok(StaticAsset {
            path,
            content_type,
            bytes,
        })
    }
}
