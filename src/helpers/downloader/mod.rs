use std::cmp::min;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use url::Url;

use crate::http::RetrievalClient;
use crate::recipes::{Resolution, Status};

/// Last non-empty path segment of `url`, or `"download"`.
pub fn target_file_name(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
        })
        .unwrap_or_else(|| "download".to_string())
}

fn progress_bar(total: Option<u64>, url: &str) -> Result<ProgressBar> {
    let pb = match total {
        Some(total) => {
            let pb = ProgressBar::new(total);
            let style = ProgressStyle::with_template(
                "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] \
                 {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
            )
            .context("Failed to build progress style")?
            .progress_chars("#>-");
            pb.set_style(style);
            pb
        }
        None => ProgressBar::new_spinner(),
    };
    pb.set_message(format!("Downloading {url}"));
    Ok(pb)
}

/// Stream `url` into `dest_dir`, keeping the remote file name.
pub async fn download_file(client: &RetrievalClient, url: &str, dest_dir: &Path) -> Result<PathBuf> {
    let mut res = client
        .raw()
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to GET from '{url}'"))?;

    if !res.status().is_success() {
        bail!("HTTP {} for '{url}'", res.status());
    }

    let total_size = res.content_length();
    let pb = progress_bar(total_size, url)?;

    let out_path = dest_dir.join(target_file_name(url));
    let mut file = File::create(&out_path).with_context(|| format!("Failed to create file '{}'", out_path.display()))?;
    let mut downloaded: u64 = 0;

    while let Some(chunk) = res.chunk().await.context("Error while downloading file")? {
        file.write_all(&chunk).context("Error while writing to file")?;
        downloaded += chunk.len() as u64;
        pb.set_position(total_size.map_or(downloaded, |total| min(downloaded, total)));
    }

    pb.finish_with_message(format!("Downloaded {url} to {}", out_path.display()));
    info!("Saved {} bytes to {}", downloaded, out_path.display());
    Ok(out_path)
}

/// Download whatever `resolution` points at. Failed resolutions carry no URL
/// and are refused.
pub async fn download_resolution(
    client: &RetrievalClient,
    name: &str,
    resolution: &Resolution,
    dest_dir: &Path,
) -> Result<PathBuf> {
    let Some(url) = resolution.url() else {
        bail!("{name} has nothing to download: {}", resolution.display_version());
    };
    if resolution.status() == Status::Degraded {
        warn!("{name}: live lookup failed, downloading the hardcoded fallback {url}");
    }
    download_file(client, url, dest_dir).await
}
