use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

pub const MEDIA_URL: &str = "/media/";
pub const POST_IMAGES_DIR: &str = "posts";

/// Uploaded files on local disk, addressed by paths relative to the root.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` under `dir` and returns the relative path, e.g.
    /// `posts/small.gif`. A random suffix is added when the name is taken.
    pub async fn save(&self, dir: &str, file_name: &str, bytes: &[u8]) -> io::Result<String> {
        let dir_path = self.root.join(dir);
        fs::create_dir_all(&dir_path).await?;

        let name = sanitize_file_name(file_name);
        let mut candidate = name.clone();
        loop {
            let path = dir_path.join(&candidate);
            match fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(bytes).await?;
                    file.flush().await?;
                    let relative = format!("{}/{}", dir, candidate);
                    info!(path = %relative, size = bytes.len(), "media file stored");
                    return Ok(relative);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    candidate = with_suffix(&name, &Uuid::new_v4().simple().to_string()[..7]);
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn read(&self, relative: &str) -> io::Result<Vec<u8>> {
        fs::read(self.root.join(relative)).await
    }

}

/// Keeps the last path component and replaces anything unusual with `_`.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn with_suffix(name: &str, suffix: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}_{}.{}", stem, suffix, ext),
        None => format!("{}_{}", name, suffix),
    }
}
