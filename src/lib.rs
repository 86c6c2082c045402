//! Mangalabel: reading-order aware annotation of manga pages.
//!
//! Mangalabel keeps one annotation record per page image. Each record holds
//! typed regions (dialogue, sound effects, faces, panels, ...) with a
//! reading order that may be shared by regions that belong together, and
//! the tooling around it suggests region text (OCR) and tags.
//!
//! # Modules
//!
//! - [`ir`]: Page record types (ImageAnnotation, Annotation, boxes, ids)
//! - [`ordering`]: Reading-order insert, update, delete and reorder
//! - [`tagging`]: Tag postprocessing, label tables and the tagger registry
//! - [`store`]: Filesystem record store with per-page locking
//! - [`assist`]: OCR and tag suggestions for page regions
//! - [`settings`]: Persisted tagger settings
//! - [`validation`]: Record validation and error reporting
//! - [`error`]: Error types for mangalabel operations

pub mod assist;
pub mod error;
pub mod ir;
pub mod ordering;
pub mod settings;
pub mod store;
pub mod tagging;
pub mod validation;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;

pub use error::MangalabelError;

use ir::{AnnotationDraft, AnnotationId, AnnotationType, BBoxXYWH, ImageId, Pixel};
use ordering::UpdateOrderPolicy;
use settings::{load_settings, save_settings, validate_threshold};
use store::{AnnotationStore, StoreOptions};
use tagging::{postprocess_tags, LabelTable};

/// The mangalabel CLI application.
#[derive(Parser)]
#[command(name = "mangalabel")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Data directory holding `images/`, `annotations/` and `settings.json`.
    #[arg(long, global = true, env = "MANGALABEL_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// How `update` applies a requested order ('direct' or 'reinsert').
    #[arg(long, global = true, default_value = "direct")]
    update_policy: UpdateOrderPolicy,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List page images with their annotation status.
    List,
    /// Print the next sequential image id.
    NextId,
    /// Copy an image into the data directory under the next id.
    Import { file: PathBuf },
    /// Print the record of a page, creating it if needed.
    Show { image_id: ImageId },
    /// Add an annotation to a page.
    Add {
        image_id: ImageId,
        #[command(flatten)]
        draft: DraftArgs,
    },
    /// Replace the fields of an annotation.
    Update {
        image_id: ImageId,
        annotation_id: String,
        #[command(flatten)]
        draft: DraftArgs,
    },
    /// Replace only the text of an annotation.
    SetText {
        image_id: ImageId,
        annotation_id: String,
        text: String,
    },
    /// Delete an annotation.
    Delete {
        image_id: ImageId,
        annotation_id: String,
    },
    /// Renumber a page's annotations in the given id order.
    Reorder {
        image_id: ImageId,
        annotation_ids: Vec<String>,
    },
    /// Set or clear the page summary.
    Summary {
        image_id: ImageId,
        /// New summary; omit to clear it.
        text: Option<String>,
    },
    /// Mark a page as completed or not.
    Status {
        image_id: ImageId,
        #[arg(long, action = clap::ArgAction::Set)]
        completed: bool,
    },
    /// Validate a record file for errors and warnings.
    Validate(ValidateArgs),
    /// Postprocess a tagger probability vector into tag suggestions.
    Tags(TagsArgs),
    /// Search a tag manifest by keyword.
    TagSearch {
        #[arg(long)]
        manifest: PathBuf,
        keyword: String,
    },
    /// Show or change the tagger settings.
    Settings(SettingsArgs),
}

/// Fields of an annotation as given on the command line.
#[derive(clap::Args)]
struct DraftArgs {
    /// Annotation type (e.g. 'dialogue', 'sound_effect', 'face').
    #[arg(long = "type")]
    kind: AnnotationType,

    /// Pixel box as 'x,y,width,height'.
    #[arg(long)]
    bbox: BBoxXYWH<Pixel>,

    /// Requested reading order.
    #[arg(long)]
    order: Option<u32>,

    #[arg(long, default_value = "")]
    text: String,

    #[arg(long)]
    character: Option<String>,

    #[arg(long)]
    subtype: Option<String>,
}

impl DraftArgs {
    fn into_draft(self) -> AnnotationDraft {
        AnnotationDraft {
            kind: self.kind,
            order: self.order,
            bbox_abs: self.bbox,
            text: self.text,
            character_id: self.character,
            subtype: self.subtype,
        }
    }
}

/// Arguments for the validate subcommand.
#[derive(clap::Args)]
struct ValidateArgs {
    /// Record file to validate.
    input: PathBuf,

    /// Treat warnings as errors (exit non-zero if any warnings).
    #[arg(long)]
    strict: bool,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the tags subcommand.
#[derive(clap::Args)]
struct TagsArgs {
    /// CSV label table the probabilities are aligned with.
    #[arg(long)]
    manifest: PathBuf,

    /// JSON array of probabilities, one per manifest row.
    #[arg(long)]
    probs: PathBuf,

    /// Overrides the threshold from the settings.
    #[arg(long)]
    threshold: Option<f32>,

    /// Annotation type of the region ('face' keeps expression tags only).
    #[arg(long = "type")]
    kind: Option<AnnotationType>,
}

/// Arguments for the settings subcommand.
#[derive(clap::Args)]
struct SettingsArgs {
    #[arg(long)]
    set_threshold: Option<f32>,

    #[arg(long)]
    set_model: Option<String>,

    /// Replaces the excluded tag list.
    #[arg(long, num_args = 0..)]
    exclude: Option<Vec<String>>,
}

/// Run the mangalabel CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), MangalabelError> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("mangalabel {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Reading-order aware annotation of manga pages.");
        println!();
        println!("Run 'mangalabel --help' for usage information.");
        return Ok(());
    };

    let data_dir = cli.data_dir;
    let store = || {
        AnnotationStore::open(
            &data_dir,
            StoreOptions {
                update_policy: cli.update_policy,
                ..StoreOptions::default()
            },
        )
    };

    match command {
        Commands::List => print_json(&store().list()?),
        Commands::NextId => {
            println!("{}", store().next_image_number()?);
            Ok(())
        }
        Commands::Import { file } => print_json(&store().import_image(&file)?),
        Commands::Show { image_id } => print_json(&store().get(&image_id)?),
        Commands::Add { image_id, draft } => {
            print_json(&store().create(&image_id, &draft.into_draft())?)
        }
        Commands::Update {
            image_id,
            annotation_id,
            draft,
        } => print_json(&store().update(
            &image_id,
            &AnnotationId::new(annotation_id),
            &draft.into_draft(),
        )?),
        Commands::SetText {
            image_id,
            annotation_id,
            text,
        } => print_json(&store().update_text(&image_id, &AnnotationId::new(annotation_id), &text)?),
        Commands::Delete {
            image_id,
            annotation_id,
        } => print_json(&store().delete(&image_id, &AnnotationId::new(annotation_id))?),
        Commands::Reorder {
            image_id,
            annotation_ids,
        } => {
            let ids: Vec<AnnotationId> = annotation_ids.into_iter().map(AnnotationId::new).collect();
            print_json(&store().reorder(&image_id, &ids)?)
        }
        Commands::Summary { image_id, text } => print_json(&store().set_summary(&image_id, text)?),
        Commands::Status {
            image_id,
            completed,
        } => print_json(&store().set_completed(&image_id, completed)?),
        Commands::Validate(args) => run_validate(args),
        Commands::Tags(args) => run_tags(&data_dir, args),
        Commands::TagSearch { manifest, keyword } => {
            let table = LabelTable::from_path(&manifest)?;
            print_json(&table.search(&keyword))
        }
        Commands::Settings(args) => run_settings(&data_dir, args),
    }
}

/// Execute the validate subcommand.
fn run_validate(args: ValidateArgs) -> Result<(), MangalabelError> {
    let record = ir::io_json::read_record(&args.input)?;

    let opts = validation::ValidateOptions {
        strict: args.strict,
        ..Default::default()
    };
    let report = validation::validate_record(&record, &opts);

    match args.output.as_str() {
        "json" => print_json(&report.to_json())?,
        "text" => print!("{}", report),
        other => {
            return Err(MangalabelError::UnsupportedFormat(format!(
                "output '{}' (supported: text, json)",
                other
            )))
        }
    }

    let has_errors = report.error_count() > 0;
    let has_warnings = report.warning_count() > 0;

    if has_errors || (opts.strict && has_warnings) {
        Err(MangalabelError::ValidationFailed {
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            report,
        })
    } else {
        Ok(())
    }
}

/// Execute the tags subcommand.
fn run_tags(data_dir: &Path, args: TagsArgs) -> Result<(), MangalabelError> {
    if let Some(threshold) = args.threshold {
        validate_threshold(threshold)?;
    }
    let settings = load_settings(&data_dir.join("settings.json"))?;
    let table = LabelTable::from_path(&args.manifest)?;

    let text = std::fs::read_to_string(&args.probs).map_err(|source| MangalabelError::Storage {
        path: args.probs.clone(),
        source,
    })?;
    let probabilities: Vec<f32> =
        serde_json::from_str(&text).map_err(|e| MangalabelError::InvalidRequest {
            field: "probs".to_string(),
            message: format!("{}: {}", args.probs.display(), e),
        })?;

    let candidates = table.candidates(&probabilities)?;
    let filter = settings.tag_filter(args.threshold).for_type(args.kind);
    print_json(&postprocess_tags(candidates, &filter))
}

/// Execute the settings subcommand.
fn run_settings(data_dir: &Path, args: SettingsArgs) -> Result<(), MangalabelError> {
    let path = data_dir.join("settings.json");
    let mut settings = load_settings(&path)?;
    let mut changed = false;

    if let Some(threshold) = args.set_threshold {
        settings.tagger_threshold = threshold;
        changed = true;
    }
    if let Some(model) = args.set_model {
        settings.tagger_model = model;
        changed = true;
    }
    if let Some(excluded) = args.exclude {
        settings.excluded_tags = excluded;
        changed = true;
    }

    if changed {
        save_settings(&path, &settings)?;
    }
    print_json(&settings)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), MangalabelError> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{}", json);
    Ok(())
}
