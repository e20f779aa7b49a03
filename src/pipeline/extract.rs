//! Format-aware text extraction.
//!
//! The staged file's extension selects a [`DocumentFormat`]; each format has
//! exactly one reader, and anything unrecognised falls into the
//! `Unsupported` arm. Readers are blocking (pdfium, tesseract, zip/XML
//! parsing) so [`extract`] moves them onto the blocking pool.
//!
//! Extraction never fails from the caller's point of view. Every reader
//! error is folded into an [`Extraction::Failed`] value that still renders
//! as empty text, but keeps the reason for the logs.

use crate::config::ExtractOptions;
use crate::error::ExtractionError;
use crate::output::{extension_of, ExtractionStatus};
use crate::pipeline::normalize::normalize;
use pdfium_render::prelude::*;
use std::io::{Cursor, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Mutex;
use tracing::{debug, warn};

/// pdfium initialises and tears down process-global state per binding, so
/// only one document is read at a time.
static PDFIUM_LOCK: Mutex<()> = Mutex::new(());

/// The document formats the extractor can read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.png`, `.jpg`, `.jpeg`: read through OCR.
    Image,
    /// `.pdf`: text layer of every page.
    Pdf,
    /// `.docx`: body paragraphs.
    Docx,
    /// `.xlsx`: cells of the first worksheet.
    Xlsx,
    /// `.txt`: UTF-8, undecodable bytes dropped.
    PlainText,
    /// Anything else; carries the lower-cased extension (empty if none).
    Unsupported(String),
}

impl DocumentFormat {
    /// Classify a lower- or mixed-case extension, with or without the dot.
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_lowercase();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" => DocumentFormat::Image,
            "pdf" => DocumentFormat::Pdf,
            "docx" => DocumentFormat::Docx,
            "xlsx" => DocumentFormat::Xlsx,
            "txt" => DocumentFormat::PlainText,
            "" => DocumentFormat::Unsupported(String::new()),
            _ => DocumentFormat::Unsupported(format!(".{ext}")),
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::from_extension(&extension_of(path))
    }

    pub fn name(&self) -> &str {
        match self {
            DocumentFormat::Image => "image",
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Xlsx => "xlsx",
            DocumentFormat::PlainText => "text",
            DocumentFormat::Unsupported(_) => "unsupported",
        }
    }
}

/// Outcome of reading one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Raw (not yet normalised) text with at least one visible character.
    Text(String),
    /// The document was read successfully but holds no text.
    Empty,
    /// The document could not be read; treated as "no text".
    Failed(ExtractionError),
}

impl Extraction {
    /// Wrap raw reader output, mapping whitespace-only text to `Empty`.
    pub fn from_raw(raw: String) -> Self {
        if normalize(&raw).is_empty() {
            Extraction::Empty
        } else {
            Extraction::Text(raw)
        }
    }

    /// The extracted text, or `""` for every non-text outcome.
    pub fn text(&self) -> &str {
        match self {
            Extraction::Text(t) => t,
            _ => "",
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Extraction::Text(t) => t,
            _ => String::new(),
        }
    }

    pub fn status(&self) -> ExtractionStatus {
        match self {
            Extraction::Text(_) => ExtractionStatus::Extracted,
            Extraction::Empty => ExtractionStatus::Empty,
            Extraction::Failed(ExtractionError::Unsupported { .. }) => ExtractionStatus::Unsupported,
            Extraction::Failed(e) => ExtractionStatus::Failed(e.to_string()),
        }
    }
}

/// Extract raw text from the file at `path`.
///
/// Runs the format reader inside `spawn_blocking`. Never returns an error:
/// unsupported types and reader failures are logged with the offending
/// filename and reported as [`Extraction::Failed`].
pub async fn extract(path: &Path, options: &ExtractOptions) -> Extraction {
    let format = DocumentFormat::from_path(path);
    if let DocumentFormat::Unsupported(ext) = &format {
        return unsupported(path, ext);
    }

    let owned_path = path.to_path_buf();
    let opts = options.clone();
    let fmt = format.clone();
    let result = tokio::task::spawn_blocking(move || read_format(&fmt, &owned_path, &opts))
        .await
        .unwrap_or_else(|e| Err(ExtractionError::Aborted(e.to_string())));

    finish(path, &format, result)
}

/// Blocking variant of [`extract`] for callers outside a runtime.
pub fn extract_blocking(path: &Path, options: &ExtractOptions) -> Extraction {
    let format = DocumentFormat::from_path(path);
    if let DocumentFormat::Unsupported(ext) = &format {
        return unsupported(path, ext);
    }
    let result = read_format(&format, path, options);
    finish(path, &format, result)
}

fn unsupported(path: &Path, ext: &str) -> Extraction {
    warn!(file = %path.display(), extension = ext, "Unsupported file type");
    Extraction::Failed(ExtractionError::Unsupported {
        extension: ext.to_string(),
    })
}

fn finish(
    path: &Path,
    format: &DocumentFormat,
    result: Result<String, ExtractionError>,
) -> Extraction {
    match result {
        Ok(raw) => {
            let extraction = Extraction::from_raw(raw);
            debug!(
                file = %path.display(),
                format = format.name(),
                chars = extraction.text().len(),
                "Extraction finished"
            );
            extraction
        }
        Err(e) => {
            warn!(file = %path.display(), format = format.name(), error = %e, "Extraction failed");
            Extraction::Failed(e)
        }
    }
}

fn read_format(
    format: &DocumentFormat,
    path: &Path,
    options: &ExtractOptions,
) -> Result<String, ExtractionError> {
    match format {
        DocumentFormat::Image => read_image(path, options),
        DocumentFormat::Pdf => read_pdf(path, options),
        DocumentFormat::Docx => read_docx(path),
        DocumentFormat::Xlsx => read_xlsx(path),
        DocumentFormat::PlainText => read_text(path),
        DocumentFormat::Unsupported(ext) => Err(ExtractionError::Unsupported {
            extension: ext.clone(),
        }),
    }
}

// ── Image: decode, re-encode as PNG, pipe through tesseract ─────────────────

fn read_image(path: &Path, options: &ExtractOptions) -> Result<String, ExtractionError> {
    let img = image::open(path).map_err(|e| ExtractionError::Image(e.to_string()))?;

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| ExtractionError::Image(e.to_string()))?;
    debug!(
        "Decoded {}x{} image → {} PNG bytes for OCR",
        img.width(),
        img.height(),
        png.len()
    );

    run_tesseract(&png, options)
}

fn run_tesseract(png: &[u8], options: &ExtractOptions) -> Result<String, ExtractionError> {
    let mut child = Command::new(&options.tesseract_cmd)
        .args(["stdin", "stdout", "-l", &options.ocr_language])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            ExtractionError::Ocr(format!("cannot start '{}': {e}", options.tesseract_cmd))
        })?;

    // tesseract reads the whole image before writing anything, so writing
    // stdin to completion first cannot deadlock on a full stdout pipe.
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(png)
            .map_err(|e| ExtractionError::Ocr(format!("writing image to OCR: {e}")))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| ExtractionError::Ocr(e.to_string()))?;
    if !output.status.success() {
        return Err(ExtractionError::Ocr(format!(
            "{} exited with {}: {}",
            options.tesseract_cmd,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// ── PDF: text layer of every page, in page order ────────────────────────────

fn bind_pdfium(lib_dir: Option<&Path>) -> Result<Pdfium, ExtractionError> {
    let bindings = match lib_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ExtractionError::Pdf(format!("cannot bind pdfium: {e:?}")))?;
    Ok(Pdfium::new(bindings))
}

fn read_pdf(path: &Path, options: &ExtractOptions) -> Result<String, ExtractionError> {
    let _guard = PDFIUM_LOCK.lock().unwrap_or_else(|p| p.into_inner());
    let pdfium = bind_pdfium(options.pdfium_lib_path.as_deref())?;

    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| ExtractionError::Pdf(format!("{e:?}")))?;

    let mut text = String::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let page_text = page
            .text()
            .map_err(|e| ExtractionError::Pdf(format!("page {}: {e:?}", idx + 1)))?;
        text.push_str(&page_text.all());
        text.push('\n');
    }
    Ok(text)
}

// ── DOCX: body paragraphs joined by newline ─────────────────────────────────

fn read_docx(path: &Path) -> Result<String, ExtractionError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractionError::Io(e.to_string()))?;
    let docx = docx_rs::read_docx(&bytes).map_err(|e| ExtractionError::Docx(format!("{e:?}")))?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            docx_rs::DocumentChild::Paragraph(para) => Some(paragraph_text(para)),
            _ => None,
        })
        .collect();

    Ok(paragraphs.join("\n"))
}

/// Concatenate the text runs of one paragraph.
fn paragraph_text(para: &docx_rs::Paragraph) -> String {
    let mut out = String::new();
    for child in &para.children {
        if let docx_rs::ParagraphChild::Run(run) = child {
            for rc in &run.children {
                if let docx_rs::RunChild::Text(t) = rc {
                    out.push_str(&t.text);
                }
            }
        }
    }
    out
}

// ── XLSX: first worksheet, row-major, one cell per line ─────────────────────

fn read_xlsx(path: &Path) -> Result<String, ExtractionError> {
    use calamine::{open_workbook, Reader, Xlsx};

    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|e: calamine::XlsxError| ExtractionError::Xlsx(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ExtractionError::Xlsx("workbook has no worksheet".into()))?
        .map_err(|e| ExtractionError::Xlsx(e.to_string()))?;

    let cells: Vec<String> = range
        .rows()
        .flat_map(|row| row.iter().map(cell_text))
        .collect();
    Ok(cells.join("\n"))
}

/// Empty cells inside the used range render as `nan`, the form the
/// classifier saw for spreadsheet gaps during training.
fn cell_text(cell: &calamine::Data) -> String {
    match cell {
        calamine::Data::Empty => "nan".to_string(),
        other => other.to_string(),
    }
}

// ── Plain text: UTF-8, invalid sequences dropped ────────────────────────────

fn read_text(path: &Path) -> Result<String, ExtractionError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractionError::Io(e.to_string()))?;
    Ok(decode_utf8_ignoring_errors(&bytes))
}

/// Decode `bytes` as UTF-8, skipping undecodable sequences.
pub fn decode_utf8_ignoring_errors(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}
