// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// seitenwerk: command-line front end for the document pipeline.
//
// Each subcommand reads its inputs, builds one typed request, runs it and
// writes every returned output into the output directory. Exit status is 2
// for client errors (bad input, wrong password) and 1 for everything else.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
#[cfg(feature = "ocr")]
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use seitenwerk_core::{
    Anchor, ConversionDirection, ErrorClass, ImageFormat, ImageWatermark, NamedColor, NamedOutput,
    OperationRequest, OrganizeMode, PipelineConfig, Quality, SeitenwerkError, SplitMode,
    TextWatermark, classify_error, parse_angle_list, parse_page_order, parse_page_ranges,
    parse_page_selection, parse_rotation_map, rotation_map_for_selection,
};
use seitenwerk_document::{Document, Pipeline};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Transform paginated documents: merge, split, compress, rasterize,
/// watermark, rotate, encrypt, organize and convert.
#[derive(Parser, Debug)]
#[command(name = "seitenwerk", version, arg_required_else_help = true)]
struct Cli {
    /// JSON file with pipeline tunables; defaults apply to missing keys.
    #[arg(short, long, env = "SEITENWERK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Directory the outputs are written to.
    #[arg(short, long, env = "SEITENWERK_OUT_DIR", default_value = ".", global = true)]
    out_dir: PathBuf,

    /// Override the configured default rasterization DPI.
    #[arg(long, global = true)]
    default_dpi: Option<u32>,

    /// Override the directory used for scoped temp files.
    #[arg(long, env = "SEITENWERK_TEMP_DIR", global = true)]
    temp_dir: Option<PathBuf>,

    /// Directory holding the text-detection and text-recognition models.
    #[cfg(feature = "ocr")]
    #[arg(long, env = "SEITENWERK_OCR_MODELS", global = true)]
    ocr_models: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG still wins when set).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Concatenate documents in the given order.
    Merge {
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,
    },
    /// Split into one file per page, a page selection, or page ranges.
    Split {
        input: PathBuf,
        /// Pages to keep in a single output, e.g. `1,3,5-7`.
        #[arg(long, conflicts_with = "ranges")]
        pages: Option<String>,
        /// One output per range, e.g. `1-3,4-6`.
        #[arg(long)]
        ranges: Option<String>,
    },
    Compress {
        input: PathBuf,
        /// low, medium or high.
        #[arg(short, long, default_value = "medium", value_parser = parse_quality)]
        quality: Quality,
    },
    /// Render every page to an image.
    Rasterize {
        input: PathBuf,
        /// png or jpeg.
        #[arg(short, long, default_value = "png", value_parser = parse_format)]
        format: ImageFormat,
        #[arg(long)]
        dpi: Option<u32>,
    },
    /// Build a PDF with one page per image.
    Derasterize {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// JSON list of per-image rotations, e.g. `[0, 90]`.
        #[arg(long, default_value = "")]
        rotations: String,
    },
    TextWatermark {
        input: PathBuf,
        #[arg(short, long)]
        text: String,
        #[arg(long, default_value = "center", value_parser = parse_anchor)]
        position: Anchor,
        #[arg(long, default_value_t = 0.3)]
        opacity: f32,
        #[arg(long, default_value_t = 36.0)]
        font_size: f32,
        #[arg(long, default_value = "gray")]
        color: String,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        rotation: f32,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        x_offset: f32,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        y_offset: f32,
    },
    ImageWatermark {
        input: PathBuf,
        #[arg(short, long)]
        image: PathBuf,
        #[arg(long, default_value = "center", value_parser = parse_anchor)]
        position: Anchor,
        #[arg(long, default_value_t = 0.3)]
        opacity: f32,
        #[arg(long, default_value_t = 1.0)]
        scale: f32,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        x_offset: f32,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        y_offset: f32,
    },
    /// Set absolute page rotations.
    Rotate {
        input: PathBuf,
        /// JSON map of 1-based page to degrees, e.g. `{"1": 90}`.
        #[arg(long, conflicts_with_all = ["pages", "angle"])]
        map: Option<String>,
        /// Page selection or `all`, used with --angle.
        #[arg(long, default_value = "all")]
        pages: String,
        #[arg(long, allow_hyphen_values = true)]
        angle: Option<i64>,
    },
    Encrypt {
        input: PathBuf,
        /// Password required to open the document; empty when omitted.
        #[arg(long, env = "SEITENWERK_USER_PASSWORD")]
        user_password: Option<String>,
        /// Permissions password; defaults to the user password.
        #[arg(long, env = "SEITENWERK_OWNER_PASSWORD")]
        owner_password: Option<String>,
    },
    Decrypt {
        input: PathBuf,
        #[arg(long, env = "SEITENWERK_PASSWORD")]
        password: String,
    },
    /// Convert between PDF and DOCX, PPTX or XLSX.
    Convert {
        input: PathBuf,
        /// pdf-to-docx, docx-to-pdf, pdf-to-pptx, pptx-to-pdf, pdf-to-xlsx
        /// or xlsx-to-pdf. Inferred from the file extension when omitted.
        #[arg(short, long, value_parser = parse_direction)]
        direction: Option<ConversionDirection>,
    },
    /// Reorder or filter pages.
    Organize {
        input: PathBuf,
        /// manual, auto, bookmark, blank-remove or duplicate-remove.
        #[arg(short, long, default_value = "auto")]
        mode: String,
        /// JSON list of 0-based page indices for manual mode.
        #[arg(long)]
        order: Option<String>,
    },
    /// Extract the text layer, with OCR fallback for scans.
    ExtractText { input: PathBuf },
    /// Render page thumbnails.
    Preview { input: PathBuf },
    /// Report whether a document looks scanned.
    Classify { input: PathBuf },
    /// Remove stale files from the temp workspace.
    SweepTemp,
}

fn parse_quality(value: &str) -> std::result::Result<Quality, String> {
    Quality::from_name(value).ok_or_else(|| format!("unknown quality {value:?}"))
}

fn parse_format(value: &str) -> std::result::Result<ImageFormat, String> {
    ImageFormat::from_name(value).ok_or_else(|| format!("unknown image format {value:?}"))
}

fn parse_anchor(value: &str) -> std::result::Result<Anchor, String> {
    Anchor::from_name(value).ok_or_else(|| format!("unknown position {value:?}"))
}

fn parse_direction(value: &str) -> std::result::Result<ConversionDirection, String> {
    ConversionDirection::from_name(value).ok_or_else(|| format!("unknown conversion {value:?}"))
}

/// Office inputs convert to PDF; PDFs need an explicit target.
fn infer_direction(input: &Path) -> Result<ConversionDirection> {
    let extension = input
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let direction = match extension.as_str() {
        "docx" => ConversionDirection::DocxToPdf,
        "pptx" => ConversionDirection::PptxToPdf,
        "xlsx" => ConversionDirection::XlsxToPdf,
        _ => {
            return Err(SeitenwerkError::invalid(format!(
                "cannot infer a conversion for {}; pass --direction",
                input.display()
            ))
            .into());
        }
    };
    Ok(direction)
}

fn parse_organize_mode(mode: &str, order: Option<&str>) -> Result<OrganizeMode> {
    let mode = match mode.trim().to_ascii_lowercase().replace('_', "-").as_str() {
        "manual" => {
            let order = order.ok_or_else(|| SeitenwerkError::invalid("manual mode needs --order"))?;
            OrganizeMode::Manual(parse_page_order(order)?)
        }
        "auto" => OrganizeMode::Auto,
        "bookmark" => OrganizeMode::Bookmark,
        "blank-remove" => OrganizeMode::BlankRemove,
        "duplicate-remove" => OrganizeMode::DuplicateRemove,
        other => return Err(SeitenwerkError::invalid(format!("unknown organize mode {other:?}")).into()),
    };
    Ok(mode)
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dpi) = cli.default_dpi {
        config.default_dpi = dpi;
    }
    if let Some(dir) = &cli.temp_dir {
        config.temp_dir = Some(dir.clone());
    }
    config.validate()?;
    Ok(config)
}

fn build_pipeline(cli: &Cli, config: PipelineConfig) -> Result<Pipeline> {
    #[allow(unused_mut)]
    let mut pipeline = Pipeline::new(config);
    #[cfg(feature = "ocr")]
    if let Some(dir) = &cli.ocr_models {
        let adapter = seitenwerk_document::OcrsAdapter::new(seitenwerk_document::OcrConfig::from_dir(dir))?;
        pipeline = pipeline.with_ocr(Arc::new(adapter));
        info!(models = %dir.display(), "OCR engine loaded");
    }
    #[cfg(not(feature = "ocr"))]
    let _ = cli;
    Ok(pipeline)
}

fn build_request(command: &Command) -> Result<OperationRequest> {
    let request = match command {
        Command::Merge { inputs } => OperationRequest::Merge {
            documents: inputs.iter().map(|path| read(path)).collect::<Result<_>>()?,
        },
        Command::Split { input, pages, ranges } => {
            let mode = match (pages, ranges) {
                (Some(pages), _) => SplitMode::Pages(parse_page_selection(pages)?),
                (None, Some(ranges)) => SplitMode::Ranges(parse_page_ranges(ranges)?),
                (None, None) => SplitMode::Each,
            };
            OperationRequest::Split {
                document: read(input)?,
                mode,
            }
        }
        Command::Compress { input, quality } => OperationRequest::Compress {
            document: read(input)?,
            quality: *quality,
        },
        Command::Rasterize { input, format, dpi } => OperationRequest::Rasterize {
            document: read(input)?,
            format: *format,
            dpi: *dpi,
        },
        Command::Derasterize { images, rotations } => OperationRequest::Derasterize {
            images: images.iter().map(|path| read(path)).collect::<Result<_>>()?,
            rotations: parse_angle_list(rotations)?,
        },
        Command::TextWatermark {
            input,
            text,
            position,
            opacity,
            font_size,
            color,
            rotation,
            x_offset,
            y_offset,
        } => OperationRequest::TextWatermark {
            document: read(input)?,
            watermark: TextWatermark {
                position: *position,
                opacity: *opacity,
                font_size: *font_size,
                color: NamedColor::from_name(color),
                rotation: *rotation,
                x_offset: *x_offset,
                y_offset: *y_offset,
                ..TextWatermark::new(text.as_str())
            },
        },
        Command::ImageWatermark {
            input,
            image,
            position,
            opacity,
            scale,
            x_offset,
            y_offset,
        } => OperationRequest::ImageWatermark {
            document: read(input)?,
            watermark: ImageWatermark {
                position: *position,
                opacity: *opacity,
                scale: *scale,
                x_offset: *x_offset,
                y_offset: *y_offset,
                ..ImageWatermark::new(read(image)?)
            },
        },
        Command::Rotate { input, map, pages, angle } => {
            let document = read(input)?;
            let rotations = match (map, angle) {
                (Some(map), _) => parse_rotation_map(map)?,
                (None, Some(angle)) => {
                    let page_count = Document::from_bytes(&document)?.page_count() as u32;
                    rotation_map_for_selection(pages, *angle, page_count)?
                }
                (None, None) => return Err(SeitenwerkError::invalid("rotate needs --map or --angle").into()),
            };
            OperationRequest::Rotate { document, rotations }
        }
        Command::Encrypt {
            input,
            user_password,
            owner_password,
        } => OperationRequest::Encrypt {
            document: read(input)?,
            user_password: user_password.clone(),
            owner_password: owner_password.clone(),
        },
        Command::Decrypt { input, password } => OperationRequest::Decrypt {
            document: read(input)?,
            password: password.clone(),
        },
        Command::Convert { input, direction } => OperationRequest::Convert {
            source: read(input)?,
            direction: match direction {
                Some(direction) => *direction,
                None => infer_direction(input)?,
            },
        },
        Command::Organize { input, mode, order } => OperationRequest::Organize {
            document: read(input)?,
            mode: parse_organize_mode(mode, order.as_deref())?,
        },
        Command::ExtractText { input } => OperationRequest::ExtractText { document: read(input)? },
        Command::Preview { input } => OperationRequest::Preview { document: read(input)? },
        Command::Classify { .. } | Command::SweepTemp => {
            return Err(SeitenwerkError::invalid("command does not build a pipeline request").into());
        }
    };
    Ok(request)
}

fn write_outputs(out_dir: &Path, outputs: &[NamedOutput]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    outputs
        .iter()
        .map(|output| {
            let path = out_dir.join(&output.name);
            fs::write(&path, &output.bytes).with_context(|| format!("writing {}", path.display()))?;
            debug!(path = %path.display(), content_type = %output.content_type, bytes = output.bytes.len(), "Output written");
            Ok(path)
        })
        .collect()
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let pipeline = build_pipeline(cli, config)?;

    match &cli.command {
        Command::Classify { input } => {
            let verdict = pipeline.classify(&read(input)?)?;
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }
        Command::SweepTemp => {
            let report = pipeline.sweep_temp()?;
            println!("removed {} stale file(s), {} failed", report.removed, report.failed);
        }
        command => {
            let request = build_request(command)?;
            let operation = request.name();
            let result = pipeline.execute(request)?;
            let written = write_outputs(&cli.out_dir, result.outputs())?;
            info!(operation, outputs = written.len(), "Done");
            for path in written {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}

/// 2 for client errors, 1 for anything else.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<SeitenwerkError>().map(classify_error) {
        Some(ErrorClass::Client) => 2,
        _ => 1,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seitenwerk_document::FontFamily;
    use seitenwerk_document::pdf::writer::plain_text_pdf;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("seitenwerk").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn client_and_server_errors_map_to_distinct_codes() {
        let client: anyhow::Error = SeitenwerkError::InvalidPassword.into();
        let server: anyhow::Error = SeitenwerkError::codec("broken xref").into();
        let io = anyhow::anyhow!("disk full");
        assert_eq!(exit_code(&client), 2);
        assert_eq!(exit_code(&server), 1);
        assert_eq!(exit_code(&io), 1);
        assert_eq!(exit_code(&client.context("decrypt")), 2);
    }

    #[test]
    fn organize_modes_parse() {
        assert_eq!(parse_organize_mode("blank_remove", None).unwrap(), OrganizeMode::BlankRemove);
        assert_eq!(
            parse_organize_mode("manual", Some("[2, 0, 1]")).unwrap(),
            OrganizeMode::Manual(vec![2, 0, 1])
        );
        assert_eq!(exit_code(&parse_organize_mode("manual", None).unwrap_err()), 2);
        assert_eq!(exit_code(&parse_organize_mode("shuffle", None).unwrap_err()), 2);
    }

    #[test]
    fn conversion_direction_is_inferred_from_office_extensions() {
        assert_eq!(infer_direction(Path::new("deck.PPTX")).unwrap(), ConversionDirection::PptxToPdf);
        assert_eq!(infer_direction(Path::new("book.xlsx")).unwrap(), ConversionDirection::XlsxToPdf);
        assert_eq!(exit_code(&infer_direction(Path::new("scan.pdf")).unwrap_err()), 2);
    }

    #[test]
    fn flags_override_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "default_dpi": 150, "max_dpi": 600 }"#).unwrap();
        let config_arg = path.to_str().unwrap();

        let from_file = load_config(&cli(&["--config", config_arg, "sweep-temp"])).unwrap();
        assert_eq!(from_file.default_dpi, 150);
        assert_eq!(from_file.max_dpi, 600);

        let overridden = load_config(&cli(&["--config", config_arg, "--default-dpi", "300", "sweep-temp"])).unwrap();
        assert_eq!(overridden.default_dpi, 300);

        let invalid = load_config(&cli(&["--config", config_arg, "--default-dpi", "900", "sweep-temp"])).unwrap_err();
        assert_eq!(exit_code(&invalid), 2);
    }

    #[test]
    fn split_writes_one_file_per_page() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.pdf");
        let text = (1..=120).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        fs::write(&input, plain_text_pdf("notes", &text, FontFamily::Sans, 11.0).unwrap()).unwrap();
        let page_count = Document::from_bytes(&fs::read(&input).unwrap()).unwrap().page_count();
        assert!(page_count > 1);

        let out = dir.path().join("out");
        let args = cli(&[
            "--out-dir",
            out.to_str().unwrap(),
            "split",
            input.to_str().unwrap(),
        ]);
        run(&args).unwrap();
        assert_eq!(fs::read_dir(&out).unwrap().count(), page_count);
    }

    #[test]
    fn rotate_requires_a_map_or_an_angle() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("one.pdf");
        fs::write(&input, plain_text_pdf("one", "hello", FontFamily::Sans, 12.0).unwrap()).unwrap();
        let command = cli(&["rotate", input.to_str().unwrap()]).command;
        assert_eq!(exit_code(&build_request(&command).unwrap_err()), 2);

        let command = cli(&["rotate", input.to_str().unwrap(), "--angle", "-90"]).command;
        match build_request(&command).unwrap() {
            OperationRequest::Rotate { rotations, .. } => {
                assert_eq!(rotations.into_iter().collect::<Vec<_>>(), vec![(1, -90)]);
            }
            other => panic!("unexpected request {other:?}"),
        }
    }
}
