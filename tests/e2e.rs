//! End-to-end tests against the real model artifacts.
//!
//! These load `models/bigbird_trained.onnx` and
//! `models/bigbird_trained/tokenizer.json` (override with
//! `DOCCLASS_MODEL_PATH` / `DOCCLASS_TOKENIZER_DIR`) and are gated behind
//! the `DOCCLASS_E2E` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   DOCCLASS_E2E=1 cargo test --test e2e -- --nocapture

use edgequake_docclass::{
    classify_text, classify_upload, extract, ClassifierConfig, DocumentLabel, ExtractOptions,
    Extraction, ModelState, RequestWorkspace, UploadResponse, UploadedDocument,
};
use std::path::PathBuf;
use std::sync::OnceLock;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn config() -> ClassifierConfig {
    let model = std::env::var("DOCCLASS_MODEL_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| manifest_dir().join("models/bigbird_trained.onnx"));
    let tokenizer = std::env::var("DOCCLASS_TOKENIZER_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| manifest_dir().join("models/bigbird_trained"));
    ClassifierConfig::builder()
        .model_path(model)
        .tokenizer_dir(tokenizer)
        .build()
        .unwrap()
}

/// The real model, loaded once for the whole test binary.
fn model() -> &'static ModelState {
    static MODEL: OnceLock<ModelState> = OnceLock::new();
    MODEL.get_or_init(|| ModelState::load(&config()).expect("model artifacts must load"))
}

/// Skip this test unless DOCCLASS_E2E is set and the artifacts exist.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("DOCCLASS_E2E").is_err() {
            println!("SKIP: set DOCCLASS_E2E=1 to run e2e tests");
            return;
        }
        let c = config();
        if !c.model_path.exists() || !c.tokenizer_file().exists() {
            println!("SKIP: model artifacts not found: {}", c.model_path.display());
            return;
        }
    }};
}

/// Skip unless DOCCLASS_E2E is set; for tests that need pdfium but not the model.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("DOCCLASS_E2E").is_err() {
            println!("SKIP: set DOCCLASS_E2E=1 to run e2e tests");
            return;
        }
    }};
}

/// A PDF with one line of Helvetica text per page and a correct xref table.
fn text_pdf(pages: &[&str]) -> Vec<u8> {
    let n = pages.len();
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{}] /Count {n} >>", kids.join(" ")),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];
    for (i, line) in pages.iter().enumerate() {
        let stream = format!("BT /F1 18 Tf 72 720 Td ({line}) Tj ET");
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            5 + 2 * i
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{stream}\nendstream",
            stream.len()
        ));
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for off in offsets {
        pdf.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    pdf
}

fn pdf_options() -> ExtractOptions {
    ExtractOptions {
        pdfium_lib_path: std::env::var("PDFIUM_LIB_PATH").ok().map(PathBuf::from),
        ..ExtractOptions::default()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn e2e_artifacts_load_and_validate() {
    e2e_skip_unless_ready!();
    let m = model();
    assert_eq!(m.max_len(), 704);
    assert!(m.encoder().vocab_size() > 0);
}

#[test]
fn e2e_contrato_text() {
    e2e_skip_unless_ready!();
    let text = "CONTRATO DE PRESTAÇÃO DE SERVIÇOS. Pelo presente instrumento particular, \
                as partes abaixo qualificadas têm entre si justo e contratado o seguinte: \
                CLÁUSULA PRIMEIRA - DO OBJETO. O presente contrato tem por objeto a \
                prestação de serviços de manutenção. CLÁUSULA SEGUNDA - DO PRAZO.";
    let r = classify_text(text, model()).unwrap();
    println!("{} {:.4}", r.label, r.confidence);
    assert_eq!(r.label, DocumentLabel::Contrato);
    assert!(r.confidence > 0.5);
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_degraded_uploads() {
    e2e_skip_unless_ready!();
    let tmp = tempfile::TempDir::new().unwrap();
    let ws = RequestWorkspace::open(tmp.path()).unwrap();
    let opts = config().extract_options();

    let img = image::RgbImage::from_pixel(200, 100, image::Rgb([255, 255, 255]));
    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    for (name, bytes) in [("blank.png", png), ("archive.zip", b"PK\x03\x04".to_vec())] {
        let r = classify_upload(UploadedDocument::new(name, bytes), &ws, model(), &opts).await;
        assert_eq!(r, UploadResponse::not_extracted(name));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_concurrent_same_filename() {
    e2e_skip_unless_ready!();
    let tmp = tempfile::TempDir::new().unwrap();
    let ws = RequestWorkspace::open(tmp.path()).unwrap();
    let opts = config().extract_options();

    let a = classify_upload(
        UploadedDocument::new("doc.txt", "CONTRATO DE LOCAÇÃO DE IMÓVEL"),
        &ws,
        model(),
        &opts,
    );
    let b = classify_upload(
        UploadedDocument::new("doc.txt", "ATA DA REUNIÃO DO CONSELHO"),
        &ws,
        model(),
        &opts,
    );
    let (ra, rb) = tokio::join!(a, b);
    assert!(ra.label().is_some(), "{ra:?}");
    assert!(rb.label().is_some(), "{rb:?}");
    assert_eq!(std::fs::read_dir(ws.root()).unwrap().count(), 0);
}

#[tokio::test]
async fn e2e_pdf_text_layer_in_page_order() {
    e2e_skip_unless_enabled!();
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("contrato.pdf");
    std::fs::write(&path, text_pdf(&["CONTRATO DE LOCACAO", "CLAUSULA PRIMEIRA"])).unwrap();

    let ex = extract(&path, &pdf_options()).await;
    let text = match &ex {
        Extraction::Text(t) => t,
        other => panic!("expected text from the PDF, got {other:?}"),
    };
    println!("{text:?}");
    let first = text.find("CONTRATO DE LOCACAO").expect("page 1 text");
    let second = text.find("CLAUSULA PRIMEIRA").expect("page 2 text");
    assert!(first < second);
    assert!(text[first..second].contains('\n'));
}

#[tokio::test]
async fn e2e_pdf_without_text_layer_is_empty() {
    e2e_skip_unless_enabled!();
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("scan.pdf");
    std::fs::write(&path, text_pdf(&[""])).unwrap();

    let ex = extract(&path, &pdf_options()).await;
    assert_eq!(ex, Extraction::Empty);
}
