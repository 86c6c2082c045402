//! Filesystem-backed page record store.
//!
//! One JSON record per page lives in the annotations directory, named
//! `<image_id>.json`. Every mutation is a read-modify-write of the whole
//! record under that page's lock:
//!
//! 1. take the page lock, which also excludes other processes using the
//!    same annotations directory
//! 2. load the record, or start an empty one from the page image
//! 3. apply the in-memory change
//! 4. write the record back (only if the change succeeded)
//!
//! Loading is strict: a record that fails to parse or carries error-level
//! validation issues is reported as [`MangalabelError::CorruptRecord`],
//! both for direct lookups and for listings.

mod lock;
mod source;

pub use source::{
    image_extension, read_image_dimensions, DirImageSource, ImageSource, SourceImage,
    IMAGE_EXTENSIONS,
};

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::MangalabelError;
use crate::ir::io_json::{read_record, write_record};
use crate::ir::{Annotation, AnnotationDraft, AnnotationId, ImageAnnotation, ImageId};
use crate::ordering::{self, SharingPolicy, UpdateOrderPolicy};
use crate::validation::{validate_record, ValidateOptions};
use lock::ImageLocks;

/// Width of generated image ids (`00001`, `00002`, ...).
const IMAGE_NUMBER_WIDTH: usize = 5;

/// Knobs of an [`AnnotationStore`].
#[derive(Clone, Debug, Default)]
pub struct StoreOptions {
    pub sharing: SharingPolicy,
    pub update_policy: UpdateOrderPolicy,
}

/// One row of [`AnnotationStore::list`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImageListing {
    pub id: ImageId,
    pub has_annotation: bool,
    pub is_completed: bool,
}

/// Page records on disk, guarded by per-page locks.
#[derive(Debug)]
pub struct AnnotationStore<S = DirImageSource> {
    annotations_dir: PathBuf,
    images: S,
    options: StoreOptions,
    validate: ValidateOptions,
    locks: ImageLocks,
}

impl AnnotationStore<DirImageSource> {
    /// Opens the standard layout under `data_dir`: `images/` and `annotations/`.
    pub fn open(data_dir: &Path, options: StoreOptions) -> Self {
        Self::with_source(
            data_dir.join("annotations"),
            DirImageSource::new(data_dir.join("images")),
            options,
        )
    }

    /// Copies an image into the images directory under the next free number
    /// and creates its empty record.
    pub fn import_image(&self, path: &Path) -> Result<ImageAnnotation, MangalabelError> {
        if image_extension(path).is_none() {
            return Err(MangalabelError::UnsupportedFormat(format!(
                "'{}' (supported: {})",
                path.display(),
                IMAGE_EXTENSIONS.join(", ")
            )));
        }

        self.locks.with_import_lock(|| {
            let id = ImageId::parse(self.next_image_number()?)?;
            let imported = self.images.import(path, &id)?;

            self.locks.with_lock(&id, || {
                let record = ImageAnnotation::new(id.clone(), imported.file_name, imported.size);
                self.save(&record)?;
                info!(
                    image_id = %id,
                    width = record.image_size.width,
                    height = record.image_size.height,
                    "image imported"
                );
                Ok(record)
            })
        })
    }
}

impl<S: ImageSource> AnnotationStore<S> {
    pub fn with_source(annotations_dir: impl Into<PathBuf>, images: S, options: StoreOptions) -> Self {
        let validate = ValidateOptions {
            strict: false,
            sharing: options.sharing.clone(),
        };
        let annotations_dir = annotations_dir.into();
        Self {
            locks: ImageLocks::new(&annotations_dir),
            annotations_dir,
            images,
            options,
            validate,
        }
    }

    pub fn images(&self) -> &S {
        &self.images
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Path of the record file for `id`.
    pub fn record_path(&self, id: &ImageId) -> PathBuf {
        self.annotations_dir.join(format!("{}.json", id))
    }

    /// Returns the record for `id`, creating and saving an empty one when
    /// the page has an image but no record yet.
    pub fn get(&self, id: &ImageId) -> Result<ImageAnnotation, MangalabelError> {
        self.locks.with_lock(id, || {
            let (record, existed) = self.load_or_init(id)?;
            if !existed {
                self.save(&record)?;
                info!(image_id = %id, "record initialized");
            }
            Ok(record)
        })
    }

    /// Adds an annotation, placing it through the ordering engine.
    pub fn create(
        &self,
        id: &ImageId,
        draft: &AnnotationDraft,
    ) -> Result<Annotation, MangalabelError> {
        draft.validate()?;
        self.mutate(id, |record| {
            let annotation_id = record.fresh_annotation_id();
            let annotation = Annotation::from_draft(annotation_id.clone(), draft, record.image_size);
            let outcome = ordering::insert(
                &mut record.annotations,
                annotation,
                draft.order,
                &self.options.sharing,
            );
            debug!(image_id = %id, annotation_id = %annotation_id, ?outcome, "annotation placed");
            record
                .annotation(&annotation_id)
                .cloned()
                .ok_or_else(|| not_found(id, &annotation_id))
        })
        .inspect(|annotation| {
            info!(image_id = %id, annotation_id = %annotation.id, order = annotation.order, "annotation created");
        })
    }

    /// Replaces every authored field of an annotation.
    ///
    /// How the draft's order is applied depends on
    /// [`StoreOptions::update_policy`].
    pub fn update(
        &self,
        id: &ImageId,
        annotation_id: &AnnotationId,
        draft: &AnnotationDraft,
    ) -> Result<Annotation, MangalabelError> {
        draft.validate()?;
        self.mutate(id, |record| {
            let size = record.image_size;
            ordering::update(
                &mut record.annotations,
                annotation_id,
                draft,
                size,
                &self.options.sharing,
                self.options.update_policy,
            )
            .ok_or_else(|| not_found(id, annotation_id))
        })
        .inspect(|annotation| {
            info!(
                image_id = %id,
                annotation_id = %annotation_id,
                order = annotation.order,
                policy = %self.options.update_policy,
                "annotation updated"
            );
        })
    }

    /// Replaces the text of one annotation, leaving everything else as is.
    pub fn update_text(
        &self,
        id: &ImageId,
        annotation_id: &AnnotationId,
        text: &str,
    ) -> Result<Annotation, MangalabelError> {
        self.mutate(id, |record| {
            let annotation = record
                .annotations
                .iter_mut()
                .find(|a| &a.id == annotation_id)
                .ok_or_else(|| not_found(id, annotation_id))?;
            annotation.text = text.to_string();
            Ok(annotation.clone())
        })
        .inspect(|_| info!(image_id = %id, annotation_id = %annotation_id, "annotation text updated"))
    }

    /// Removes an annotation and returns it. Other orders are left as they are.
    pub fn delete(
        &self,
        id: &ImageId,
        annotation_id: &AnnotationId,
    ) -> Result<Annotation, MangalabelError> {
        self.mutate(id, |record| {
            ordering::delete(&mut record.annotations, annotation_id)
                .ok_or_else(|| not_found(id, annotation_id))
        })
        .inspect(|_| info!(image_id = %id, annotation_id = %annotation_id, "annotation deleted"))
    }

    /// Renumbers the page from an ordered list of annotation ids.
    pub fn reorder(
        &self,
        id: &ImageId,
        ids: &[AnnotationId],
    ) -> Result<ImageAnnotation, MangalabelError> {
        self.mutate(id, |record| {
            let annotations = std::mem::take(&mut record.annotations);
            record.annotations = ordering::reorder(annotations, ids);
            Ok(record.clone())
        })
        .inspect(|record| {
            info!(image_id = %id, listed = ids.len(), total = record.annotations.len(), "annotations reordered");
        })
    }

    pub fn set_summary(
        &self,
        id: &ImageId,
        summary: Option<String>,
    ) -> Result<ImageAnnotation, MangalabelError> {
        self.mutate(id, |record| {
            record.page_summary = summary;
            Ok(record.clone())
        })
        .inspect(|_| info!(image_id = %id, "page summary updated"))
    }

    pub fn set_completed(
        &self,
        id: &ImageId,
        completed: bool,
    ) -> Result<ImageAnnotation, MangalabelError> {
        self.mutate(id, |record| {
            record.is_completed = completed;
            Ok(record.clone())
        })
        .inspect(|_| info!(image_id = %id, completed, "completion status updated"))
    }

    /// Every page image, sorted by id, with its record status.
    ///
    /// A record that cannot be loaded fails the whole listing.
    pub fn list(&self) -> Result<Vec<ImageListing>, MangalabelError> {
        let mut listings = Vec::new();
        for id in self.images.list()? {
            let path = self.record_path(&id);
            let listing = if path.is_file() {
                let record = self.locks.with_lock(&id, || self.load(&id, &path))?;
                ImageListing {
                    id,
                    has_annotation: true,
                    is_completed: record.is_completed,
                }
            } else {
                ImageListing {
                    id,
                    has_annotation: false,
                    is_completed: false,
                }
            };
            listings.push(listing);
        }
        Ok(listings)
    }

    /// The next free sequential image id: one past the largest numeric id
    /// among images and records, zero-padded to five digits.
    pub fn next_image_number(&self) -> Result<String, MangalabelError> {
        let from_images = self
            .images
            .list()?
            .iter()
            .filter_map(|id| id.as_str().parse::<u64>().ok())
            .max();
        let from_records = self.record_numbers()?.into_iter().max();

        let next = from_images.max(from_records).map_or(1, |n| n.saturating_add(1));
        Ok(format!("{:0width$}", next, width = IMAGE_NUMBER_WIDTH))
    }

    fn record_numbers(&self) -> Result<Vec<u64>, MangalabelError> {
        if !self.annotations_dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries =
            std::fs::read_dir(&self.annotations_dir).map_err(|source| MangalabelError::Storage {
                path: self.annotations_dir.clone(),
                source,
            })?;

        let mut numbers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| MangalabelError::Storage {
                path: self.annotations_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(n) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            {
                numbers.push(n);
            }
        }
        Ok(numbers)
    }

    /// Runs one read-modify-write of the record for `id`.
    fn mutate<T>(
        &self,
        id: &ImageId,
        f: impl FnOnce(&mut ImageAnnotation) -> Result<T, MangalabelError>,
    ) -> Result<T, MangalabelError> {
        self.locks.with_lock(id, || {
            let (mut record, _) = self.load_or_init(id)?;
            let value = f(&mut record)?;
            record.refresh_relative_boxes();
            self.save(&record)?;
            Ok(value)
        })
    }

    /// Loads the record for `id`, or builds an empty one from the page
    /// image. The flag tells whether the record already existed.
    ///
    /// Must be called with the page lock held.
    fn load_or_init(&self, id: &ImageId) -> Result<(ImageAnnotation, bool), MangalabelError> {
        let path = self.record_path(id);
        if path.is_file() {
            return Ok((self.load(id, &path)?, true));
        }

        let image = self
            .images
            .lookup(id)?
            .ok_or_else(|| MangalabelError::ImageNotFound {
                image_id: id.to_string(),
            })?;
        Ok((
            ImageAnnotation::new(id.clone(), image.file_name, image.size),
            false,
        ))
    }

    fn load(&self, id: &ImageId, path: &Path) -> Result<ImageAnnotation, MangalabelError> {
        let mut record = read_record(path).inspect_err(|e| warn!(image_id = %id, error = %e, "corrupt record"))?;

        if &record.image_id != id {
            warn!(image_id = %id, found = %record.image_id, "record id mismatch");
            return Err(MangalabelError::CorruptRecord {
                path: path.to_path_buf(),
                message: format!("record is for image '{}', expected '{}'", record.image_id, id),
            });
        }

        let report = validate_record(&record, &self.validate);
        if !report.is_ok() {
            let message = report
                .errors()
                .map(|issue| format!("{:?} in {}: {}", issue.code, issue.context, issue.message))
                .collect::<Vec<_>>()
                .join("; ");
            warn!(image_id = %id, errors = report.error_count(), "invalid record");
            return Err(MangalabelError::CorruptRecord {
                path: path.to_path_buf(),
                message,
            });
        }

        record.refresh_relative_boxes();
        Ok(record)
    }

    fn save(&self, record: &ImageAnnotation) -> Result<(), MangalabelError> {
        std::fs::create_dir_all(&self.annotations_dir).map_err(|source| {
            MangalabelError::Storage {
                path: self.annotations_dir.clone(),
                source,
            }
        })?;
        write_record(&self.record_path(&record.image_id), record)
    }
}

fn not_found(id: &ImageId, annotation_id: &AnnotationId) -> MangalabelError {
    MangalabelError::AnnotationNotFound {
        image_id: id.to_string(),
        annotation_id: annotation_id.to_string(),
    }
}
