//! Packs a prebuilt screen-saver template and the downloaded covers into a
//! zip the user can unpack and install with one double-click.
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::Context;
use reqwest::blocking::Client;
use saverconfig::BundleSection;
use serde::Serialize;
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("saver template file missing: {0}")]
    MissingTemplate(PathBuf),
    #[error("failed to download cover: {url} ({reason})")]
    Download { url: String, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write archive: {0}")]
    Archive(#[from] zip::result::ZipError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleOptions {
    /// Bundle and executable name, without the `.saver` suffix.
    pub name: String,
    /// Human name used by the installer script.
    pub display_name: String,
    /// Covers downloaded concurrently per batch.
    pub batch_size: usize,
}

impl BundleOptions {
    pub fn from_config(section: &BundleSection) -> Self {
        Self {
            name: section.name.clone(),
            display_name: section.display_name.clone(),
            batch_size: section.batch_size.max(1),
        }
    }

    fn bundle_dir(&self) -> String {
        format!("{}.saver", self.name)
    }
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self::from_config(&BundleSection::default())
    }
}

/// The compiled saver executable and its `Info.plist`.
#[derive(Debug, Clone)]
pub struct SaverTemplate {
    pub binary: Vec<u8>,
    pub info_plist: Vec<u8>,
}

impl SaverTemplate {
    /// Reads `<dir>/<name>` and `<dir>/Info.plist`.
    pub fn load(dir: &Path, name: &str) -> Result<Self, BundleError> {
        let binary = read_template_file(&dir.join(name))?;
        let info_plist = read_template_file(&dir.join("Info.plist"))?;
        Ok(Self { binary, info_plist })
    }
}

fn read_template_file(path: &Path) -> Result<Vec<u8>, BundleError> {
    if !path.is_file() {
        return Err(BundleError::MissingTemplate(path.to_path_buf()));
    }
    Ok(fs::read(path)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssemblyPhase {
    Downloading,
    Assembling,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssemblyProgress {
    pub phase: AssemblyPhase,
    pub current: usize,
    pub total: usize,
}

impl AssemblyProgress {
    fn new(phase: AssemblyPhase, current: usize, total: usize) -> Self {
        Self {
            phase,
            current,
            total,
        }
    }
}

/// Shell script that signs the bundle ad hoc and copies it into the user's
/// screen saver folder.
pub fn install_script(options: &BundleOptions) -> String {
    let bundle = shell_double_quoted(&options.bundle_dir());
    format!(
        "#!/bin/bash\n\
         cd \"$(dirname \"$0\")\"\n\
         echo \"Installing {display}...\"\n\
         codesign --force --sign - \"{bundle}\"\n\
         cp -r \"{bundle}\" ~/Library/Screen\\ Savers/\n\
         echo \"\"\n\
         echo \"Installed! Open System Settings > Screen Saver to select {display}.\"\n\
         echo \"Press any key to close...\"\n\
         read -n 1\n",
        display = shell_double_quoted(&options.display_name),
        bundle = bundle,
    )
}

/// Escapes the characters bash still interprets inside double quotes.
fn shell_double_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Fetches cover bytes over HTTP, failing on any non-success status.
pub fn http_fetcher(http: Client) -> impl Fn(&str) -> anyhow::Result<Vec<u8>> + Sync {
    move |url: &str| {
        let response = http
            .get(url)
            .send()
            .with_context(|| format!("requesting {url}"))?
            .error_for_status()
            .context("cover request failed")?;
        Ok(response.bytes()?.to_vec())
    }
}

/// Downloads every cover with `fetch` and writes the installable archive.
///
/// Covers are numbered `1.jpg`, `2.jpg`, ... in input order. The first failed
/// download aborts the whole assembly.
pub fn assemble_bundle<F, P>(
    cover_urls: &[String],
    template: &SaverTemplate,
    options: &BundleOptions,
    fetch: F,
    mut progress: P,
) -> Result<Vec<u8>, BundleError>
where
    F: Fn(&str) -> anyhow::Result<Vec<u8>> + Sync,
    P: FnMut(AssemblyProgress),
{
    let total = cover_urls.len() + 2;
    progress(AssemblyProgress::new(AssemblyPhase::Downloading, 0, total));

    let contents = format!("{}/Contents", options.bundle_dir());
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let executable = deflated.unix_permissions(0o755);

    zip.start_file(format!("{contents}/MacOS/{}", options.name), executable)?;
    zip.write_all(&template.binary)?;
    zip.start_file(format!("{contents}/Info.plist"), deflated)?;
    zip.write_all(&template.info_plist)?;
    progress(AssemblyProgress::new(AssemblyPhase::Downloading, 2, total));

    // JPEG data is stored as is.
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    let batch_size = options.batch_size.max(1);
    for (batch_index, batch) in cover_urls.chunks(batch_size).enumerate() {
        let first = batch_index * batch_size;
        let images = download_batch(batch, &fetch)?;
        for (offset, bytes) in images.into_iter().enumerate() {
            zip.start_file(
                format!("{contents}/Resources/covers/{}.jpg", first + offset + 1),
                stored,
            )?;
            zip.write_all(&bytes)?;
        }
        let done = (first + batch_size).min(cover_urls.len());
        debug!(downloaded = done, of = cover_urls.len(), "downloaded cover batch");
        progress(AssemblyProgress::new(AssemblyPhase::Downloading, done + 2, total));
    }

    zip.start_file(
        format!("Install {}.command", options.display_name),
        executable,
    )?;
    zip.write_all(install_script(options).as_bytes())?;

    progress(AssemblyProgress::new(AssemblyPhase::Assembling, 0, 1));
    let bytes = zip.finish()?.into_inner();
    progress(AssemblyProgress::new(AssemblyPhase::Done, 1, 1));
    info!(
        covers = cover_urls.len(),
        bytes = bytes.len(),
        bundle = %options.bundle_dir(),
        "assembled saver bundle"
    );
    Ok(bytes)
}

fn download_batch<F>(batch: &[String], fetch: &F) -> Result<Vec<Vec<u8>>, BundleError>
where
    F: Fn(&str) -> anyhow::Result<Vec<u8>> + Sync,
{
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::scope(|scope| {
        for (offset, url) in batch.iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move || {
                let _ = tx.send((offset, fetch(url)));
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Option<Vec<u8>>> = vec![None; batch.len()];
    let mut failure: Option<(usize, anyhow::Error)> = None;
    for (offset, result) in rx.iter() {
        match result {
            Ok(bytes) => slots[offset] = Some(bytes),
            Err(err) => {
                // Report the earliest failing url in the batch.
                if failure.as_ref().map_or(true, |(seen, _)| offset < *seen) {
                    failure = Some((offset, err));
                }
            }
        }
    }
    if let Some((offset, err)) = failure {
        return Err(BundleError::Download {
            url: batch[offset].clone(),
            reason: format!("{err:#}"),
        });
    }
    slots
        .into_iter()
        .zip(batch)
        .map(|(slot, url)| {
            slot.ok_or_else(|| BundleError::Download {
                url: url.clone(),
                reason: "download produced no result".to_string(),
            })
        })
        .collect()
}
