//! Page image access.
//!
//! The store only needs three things from page images: find one by id
//! (with its file name and pixel size), crop a region of it, and list all
//! of them. [`DirImageSource`] serves these from a flat directory where
//! each image is named `<image_id>.<ext>`.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use walkdir::WalkDir;

use crate::error::MangalabelError;
use crate::ir::{BBoxXYWH, ImageId, ImageSize, Pixel};

/// Accepted image extensions, in lookup priority order.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// A page image known to an [`ImageSource`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceImage {
    pub image_id: ImageId,
    pub file_name: String,
    pub size: ImageSize,
}

/// Where page images come from.
pub trait ImageSource: Send + Sync {
    /// Finds the image for `id`, or `None` if there is none.
    fn lookup(&self, id: &ImageId) -> Result<Option<SourceImage>, MangalabelError>;

    /// Crops `bbox` out of the image, clamped to the image bounds.
    fn crop(&self, id: &ImageId, bbox: &BBoxXYWH<Pixel>) -> Result<RgbImage, MangalabelError>;

    /// Ids of every image, sorted.
    fn list(&self) -> Result<Vec<ImageId>, MangalabelError>;
}

/// Images stored as `<dir>/<image_id>.<ext>`.
#[derive(Clone, Debug)]
pub struct DirImageSource {
    dir: PathBuf,
}

impl DirImageSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn find_path(&self, id: &ImageId) -> Option<PathBuf> {
        IMAGE_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{}.{}", id, ext)))
            .find(|candidate| candidate.is_file())
    }

    /// Copies `source` into the directory as `<image_id>.<ext>`.
    ///
    /// The extension is taken from `source`, lowercased, and must be one of
    /// [`IMAGE_EXTENSIONS`].
    pub fn import(&self, source: &Path, id: &ImageId) -> Result<SourceImage, MangalabelError> {
        let ext = image_extension(source).ok_or_else(|| {
            MangalabelError::UnsupportedFormat(format!(
                "'{}' (supported: {})",
                source.display(),
                IMAGE_EXTENSIONS.join(", ")
            ))
        })?;

        let size = read_image_dimensions(source)?;
        fs::create_dir_all(&self.dir).map_err(|source| MangalabelError::Storage {
            path: self.dir.clone(),
            source,
        })?;

        let file_name = format!("{}.{}", id, ext);
        let target = self.dir.join(&file_name);
        fs::copy(source, &target).map_err(|source| MangalabelError::Storage {
            path: target.clone(),
            source,
        })?;

        Ok(SourceImage {
            image_id: id.clone(),
            file_name,
            size,
        })
    }
}

impl ImageSource for DirImageSource {
    fn lookup(&self, id: &ImageId) -> Result<Option<SourceImage>, MangalabelError> {
        let Some(path) = self.find_path(id) else {
            return Ok(None);
        };
        let size = read_image_dimensions(&path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Some(SourceImage {
            image_id: id.clone(),
            file_name,
            size,
        }))
    }

    fn crop(&self, id: &ImageId, bbox: &BBoxXYWH<Pixel>) -> Result<RgbImage, MangalabelError> {
        let path = self
            .find_path(id)
            .ok_or_else(|| MangalabelError::ImageNotFound {
                image_id: id.to_string(),
            })?;
        let decoded = image::open(&path).map_err(|source| MangalabelError::ImageDecode {
            path: path.clone(),
            source,
        })?;
        let rgb = decoded.to_rgb8();

        let (x, y, width, height) =
            clamp_region(bbox, rgb.width(), rgb.height()).ok_or_else(|| {
                MangalabelError::InvalidRequest {
                    field: "bbox_abs".to_string(),
                    message: format!(
                        "region {:?} does not overlap the {}x{} image",
                        bbox,
                        rgb.width(),
                        rgb.height()
                    ),
                }
            })?;

        Ok(image::imageops::crop_imm(&rgb, x, y, width, height).to_image())
    }

    fn list(&self) -> Result<Vec<ImageId>, MangalabelError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|source| MangalabelError::Storage {
                path: self.dir.clone(),
                source: source.into(),
            })?;
            if !entry.file_type().is_file() || image_extension(entry.path()).is_none() {
                continue;
            }
            // Files whose stem is not a usable id are not pages.
            let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(id) = ImageId::parse(stem) {
                ids.push(id);
            }
        }

        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

/// Returns the lowercased extension of `path` if it is an accepted image type.
pub fn image_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Reads the pixel size of an image without decoding it.
pub fn read_image_dimensions(path: &Path) -> Result<ImageSize, MangalabelError> {
    let size = imagesize::size(path).map_err(|source| MangalabelError::ImageDimensionRead {
        path: path.to_path_buf(),
        source,
    })?;

    let width: u32 = size
        .width
        .try_into()
        .map_err(|_| {
            MangalabelError::UnsupportedFormat(format!(
                "{}: image width {} does not fit in u32",
                path.display(),
                size.width
            ))
        })?;
    let height: u32 = size
        .height
        .try_into()
        .map_err(|_| {
            MangalabelError::UnsupportedFormat(format!(
                "{}: image height {} does not fit in u32",
                path.display(),
                size.height
            ))
        })?;

    Ok(ImageSize::new(width, height))
}

/// Intersects a pixel box with an image of the given size.
///
/// Returns `(x, y, width, height)` in whole pixels, or `None` when the
/// intersection is empty.
pub(crate) fn clamp_region(
    bbox: &BBoxXYWH<Pixel>,
    image_width: u32,
    image_height: u32,
) -> Option<(u32, u32, u32, u32)> {
    if !bbox.is_finite() {
        return None;
    }
    let left = bbox.x.max(0.0).floor();
    let top = bbox.y.max(0.0).floor();
    let right = bbox.right().min(f64::from(image_width)).ceil();
    let bottom = bbox.bottom().min(f64::from(image_height)).ceil();

    if right <= left || bottom <= top {
        return None;
    }
    // All four values lie within [0, u32::MAX] here.
    let (left, top) = (left as u32, top as u32);
    Some((left, top, right as u32 - left, bottom as u32 - top))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_inside() {
        let bbox = BBoxXYWH::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(clamp_region(&bbox, 100, 100), Some((10, 20, 30, 40)));
    }

    #[test]
    fn test_clamp_partial_overlap() {
        let bbox = BBoxXYWH::new(-5.0, 90.0, 20.0, 20.0);
        assert_eq!(clamp_region(&bbox, 100, 100), Some((0, 90, 15, 10)));
    }

    #[test]
    fn test_clamp_fractional_grows_outward() {
        let bbox = BBoxXYWH::new(10.5, 10.5, 5.0, 5.0);
        assert_eq!(clamp_region(&bbox, 100, 100), Some((10, 10, 6, 6)));
    }

    #[test]
    fn test_clamp_outside_is_none() {
        let bbox = BBoxXYWH::new(200.0, 200.0, 10.0, 10.0);
        assert_eq!(clamp_region(&bbox, 100, 100), None);
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension(Path::new("a/b.PNG")), Some("png".to_string()));
        assert_eq!(image_extension(Path::new("b.webp")), Some("webp".to_string()));
        assert_eq!(image_extension(Path::new("b.gif")), None);
        assert_eq!(image_extension(Path::new("noext")), None);
    }

    #[test]
    fn test_lookup_and_crop() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbImage::from_pixel(40, 30, image::Rgb([200, 10, 10]));
        img.save(dir.path().join("00001.png")).unwrap();

        let source = DirImageSource::new(dir.path());
        let id = ImageId::parse("00001").unwrap();
        let found = source.lookup(&id).unwrap().unwrap();
        assert_eq!(found.file_name, "00001.png");
        assert_eq!(found.size, ImageSize::new(40, 30));

        let crop = source.crop(&id, &BBoxXYWH::new(30.0, 20.0, 50.0, 50.0)).unwrap();
        assert_eq!(crop.dimensions(), (10, 10));
        assert_eq!(crop.get_pixel(0, 0).0, [200, 10, 10]);

        assert!(source
            .lookup(&ImageId::parse("00002").unwrap())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_list_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["00002.jpg", "00001.png", "notes.txt", "bad name.png"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let ids = DirImageSource::new(dir.path()).list().unwrap();
        let ids: Vec<&str> = ids.iter().map(ImageId::as_str).collect();
        assert_eq!(ids, vec!["00001", "00002"]);
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirImageSource::new(dir.path().join("missing"));
        assert!(source.list().unwrap().is_empty());
    }
}
