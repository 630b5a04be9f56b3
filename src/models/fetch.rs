use crate::utils::error::ClassifierError;
use crate::Result;
use std::fs::{self, File};
use std::io;
use std::path::Path;

/// 模型或标签文件缺失时从 url 下载一次。文件已存在则直接返回。
///
/// 先写入 `.part` 临时文件，下载完成后再重命名，避免留下半截文件。
pub fn ensure_file(path: &Path, url: Option<&str>) -> Result<()> {
    if path.exists() {
        return Ok(());
    }

    let url = url.ok_or_else(|| {
        ClassifierError::ModelLoad(format!(
            "File not found: {} (no download url configured)",
            path.display()
        ))
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    tracing::info!("Downloading {} to {}", url, path.display());

    let response = ureq::get(url)
        .call()
        .map_err(|e| ClassifierError::ModelLoad(format!("Failed to download {}: {}", url, e)))?;

    let partial = path.with_extension("part");
    let mut file = File::create(&partial)?;
    let written = io::copy(&mut response.into_reader(), &mut file);
    drop(file);

    match written {
        Ok(bytes) => {
            fs::rename(&partial, path)?;
            tracing::info!("Download complete: {} bytes", bytes);
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&partial);
            Err(ClassifierError::ModelLoad(format!(
                "Failed to write {}: {}",
                path.display(),
                e
            )))
        }
    }
}
