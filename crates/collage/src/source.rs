//! Cover bitmaps and where they come from.
//!
//! `ImageSource::load` never fails: a missing directory or an unreadable file
//! degrades to fewer (or zero) covers, and the grid simply declines to build
//! until some arrive.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{ImageReader, Rgba, RgbaImage};
use serde::Serialize;
use tracing::{debug, error, warn};

/// Index of a cover inside the `ImageSet` it was laid out from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CoverRef(pub usize);

/// Immutable decoded cover bitmap. Clones share the pixel buffer.
#[derive(Debug, Clone)]
pub struct CoverImage {
    label: String,
    pixels: Arc<RgbaImage>,
}

impl CoverImage {
    pub fn new(label: impl Into<String>, pixels: RgbaImage) -> Self {
        Self {
            label: label.into(),
            pixels: Arc::new(pixels),
        }
    }

    /// Single-colour cover, used for placeholders.
    pub fn solid(label: impl Into<String>, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::new(label, RgbaImage::from_pixel(width, height, Rgba(rgba)))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageSet {
    images: Vec<CoverImage>,
}

impl ImageSet {
    pub fn new(images: Vec<CoverImage>) -> Self {
        Self { images }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn get(&self, cover: CoverRef) -> Option<&CoverImage> {
        self.images.get(cover.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CoverImage> {
        self.images.iter()
    }
}

pub trait ImageSource {
    fn load(&self) -> ImageSet;
}

impl ImageSource for ImageSet {
    fn load(&self) -> ImageSet {
        self.clone()
    }
}

/// Reads every `.jpg` in a directory, in file-name order.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    candidates: Vec<PathBuf>,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            candidates: vec![dir.into()],
        }
    }

    /// Looks for the covers folder inside a `.saver` bundle or an unpacked
    /// resources directory.
    pub fn for_bundle(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            candidates: vec![
                root.join("Contents").join("Resources").join("covers"),
                root.join("Resources").join("covers"),
                root.join("covers"),
            ],
        }
    }

    fn resolve(&self) -> Option<&Path> {
        self.candidates
            .iter()
            .map(PathBuf::as_path)
            .find(|candidate| candidate.is_dir())
    }
}

impl ImageSource for DirectorySource {
    fn load(&self) -> ImageSet {
        let Some(dir) = self.resolve() else {
            error!(candidates = ?self.candidates, "covers directory not found");
            return ImageSet::default();
        };
        debug!(path = %dir.display(), "loading covers");

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                error!(path = %dir.display(), error = %err, "could not list covers directory");
                return ImageSet::default();
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| is_cover_file(path))
            .collect();
        files.sort();

        let mut images = Vec::with_capacity(files.len());
        for file in files {
            match decode_cover(&file) {
                Ok(pixels) => {
                    let label = file
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    images.push(CoverImage::new(label, pixels));
                }
                Err(err) => {
                    warn!(path = %file.display(), error = %err, "skipped undecodable cover");
                }
            }
        }

        debug!(count = images.len(), "loaded cover images");
        ImageSet::new(images)
    }
}

fn is_cover_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
            .unwrap_or(false)
}

fn decode_cover(path: &Path) -> image::ImageResult<RgbaImage> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(image.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_jpeg(path: &Path, rgb: [u8; 3]) {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb(rgb));
        img.save_with_format(path, image::ImageFormat::Jpeg)
            .expect("write jpeg");
    }

    #[test]
    fn loads_jpegs_in_name_order_and_skips_others() {
        let temp = tempfile::tempdir().unwrap();
        let covers = temp.path().join("Contents/Resources/covers");
        fs::create_dir_all(&covers).unwrap();
        write_jpeg(&covers.join("2.jpg"), [0, 255, 0]);
        write_jpeg(&covers.join("1.jpg"), [255, 0, 0]);
        fs::write(covers.join("notes.txt"), "ignore me").unwrap();
        fs::write(covers.join("3.jpg"), b"definitely not a jpeg").unwrap();

        let set = DirectorySource::for_bundle(temp.path()).load();
        assert_eq!(set.len(), 2);
        let labels: Vec<&str> = set.iter().map(CoverImage::label).collect();
        assert_eq!(labels, vec!["1.jpg", "2.jpg"]);
        let first = set.get(CoverRef(0)).unwrap();
        assert_eq!((first.width(), first.height()), (4, 4));
    }

    #[test]
    fn missing_directory_yields_empty_set() {
        let temp = tempfile::tempdir().unwrap();
        let set = DirectorySource::for_bundle(temp.path().join("nope")).load();
        assert!(set.is_empty());
    }

    #[test]
    fn plain_directory_source() {
        let temp = tempfile::tempdir().unwrap();
        write_jpeg(&temp.path().join("a.JPG"), [1, 2, 3]);
        let set = DirectorySource::new(temp.path()).load();
        assert_eq!(set.len(), 1);
    }
}
