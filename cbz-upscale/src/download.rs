//! Fetches the Real-ESRGAN ncnn Vulkan release matching the current OS.

use std::{
    env, fs,
    io::{self, Cursor},
    path::Path,
};

use anyhow::{bail, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use reqwest_middleware::ClientBuilder;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::realesrgan::{binary_name, find_binary};

pub static RELEASE_BASE_URL: &str =
    "https://github.com/xinntao/Real-ESRGAN/releases/download/v0.2.5.0";
pub static RELEASE_NAME: &str = "realesrgan-ncnn-vulkan-20220424";
pub static DEFAULT_MAX_DOWNLOAD_RETRIES: u32 = 5;

/// Url of the release archive for `os`, as returned by `std::env::consts::OS`
pub fn release_url(os: &str) -> Result<String> {
    let platform = match os {
        "linux" => "ubuntu",
        "macos" => "macos",
        "windows" => "windows",
        other => bail!("Real-ESRGAN doesn't provide a release for {other}"),
    };

    Ok(format!("{RELEASE_BASE_URL}/{RELEASE_NAME}-{platform}.zip"))
}

/// Downloads the release into `cache` and returns the path of the binary
pub fn install(cache: &Utf8Path) -> Result<Utf8PathBuf> {
    let url = release_url(env::consts::OS)?;
    let runtime = tokio::runtime::Runtime::new()?;
    let bytes = runtime
        .block_on(fetch(&url, DEFAULT_MAX_DOWNLOAD_RETRIES))
        .with_context(|| format!("downloading {url}"))?;

    fs::create_dir_all(cache)?;
    unpack(&bytes, cache)?;

    let Some(binary) = find_binary(cache) else {
        bail!("{} not found in {url}", binary_name());
    };
    make_executable(&binary)?;
    info!("Real-ESRGAN installed in {cache}");

    Ok(binary)
}

async fn fetch(url: &str, max_retries: u32) -> Result<Vec<u8>> {
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
    let client = ClientBuilder::new(reqwest::Client::new())
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build();

    info!("Downloading {url}");
    let response = client.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;
    debug!("downloaded {} bytes", bytes.len());

    Ok(bytes.to_vec())
}

/// Extracts the zip `bytes` into `dest`, entries escaping `dest` are skipped
pub fn unpack(bytes: &[u8], dest: &Utf8Path) -> Result<()> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        let Some(path) = file
            .enclosed_name()
            .map(|name| dest.as_std_path().join(name))
        else {
            warn!("skipping {}, it points outside of {dest}", file.name());
            continue;
        };

        if file.is_dir() {
            fs::create_dir_all(&path)?;
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = fs::File::create(&path)?;
        io::copy(&mut file, &mut out)?;
        if let Some(mode) = file.unix_mode() {
            set_mode(&path, mode)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Utf8Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = path.metadata()?.permissions().mode();
    set_mode(path.as_std_path(), mode | 0o755)
}

#[cfg(not(unix))]
fn make_executable(_path: &Utf8Path) -> io::Result<()> {
    Ok(())
}
