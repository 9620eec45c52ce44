//! Integration tests for multi-format document loading.
//!
//! Office documents go through the same segment and rank path as plain
//! text; malformed uploads fail without output.

mod common;

use common::run_cqa;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

fn zip_with(entries: &[(&str, String)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        for (name, body) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

/// Minimal docx with one `<w:p>` per paragraph.
fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{}</w:body></w:document>",
        body
    );
    zip_with(&[("word/document.xml", xml)])
}

fn minimal_xlsx(shared: &[&str]) -> Vec<u8> {
    let strings: String = shared
        .iter()
        .map(|s| format!("<si><t>{}</t></si>", s))
        .collect();
    let cells: String = (0..shared.len())
        .map(|i| format!("<c r=\"A{}\" t=\"s\"><v>{}</v></c>", i + 1, i))
        .collect();
    zip_with(&[
        (
            "xl/sharedStrings.xml",
            format!("<?xml version=\"1.0\"?><sst>{}</sst>", strings),
        ),
        (
            "xl/worksheets/sheet1.xml",
            format!(
                "<?xml version=\"1.0\"?><worksheet><sheetData><row r=\"1\">\
                 {}<c r=\"B1\"><v>42</v></c></row></sheetData></worksheet>",
                cells
            ),
        ),
    ])
}

fn setup_file_support_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("files")).unwrap();
    fs::write(
        root.join("config").join("cqa.toml"),
        "[segmentation]\nsize = 4\n\n[generation]\nprovider = \"disabled\"\n",
    )
    .unwrap();

    (tmp, root.join("config").join("cqa.toml"))
}

fn write_file(tmp: &TempDir, name: &str, bytes: &[u8]) -> String {
    let path = tmp.path().join("files").join(name);
    fs::write(&path, bytes).unwrap();
    path.display().to_string()
}

#[test]
fn file_support_docx_segments() {
    let (tmp, config_path) = setup_file_support_env();
    let path = write_file(
        &tmp,
        "guide.docx",
        &minimal_docx(&["Install the agent first.", "Then restart the service."]),
    );

    let (stdout, stderr, success) = run_cqa(&config_path, &["segments", &path]);
    assert!(success, "segments failed: {}", stderr);
    // Paragraph boundaries separate words.
    assert!(stdout.contains("[segment 1] (4 words)\nThen restart the service.\n"));
}

#[test]
fn file_support_docx_rank() {
    let (tmp, config_path) = setup_file_support_env();
    let path = write_file(
        &tmp,
        "guide.docx",
        &minimal_docx(&["Install the agent first.", "Then restart the service."]),
    );

    let (stdout, _, success) = run_cqa(&config_path, &["rank", &path, "how to restart"]);
    assert!(success);
    assert!(stdout.starts_with("segment: 1"), "got: {}", stdout);
}

#[test]
fn file_support_xlsx_shared_strings() {
    let (tmp, config_path) = setup_file_support_env();
    let path = write_file(&tmp, "budget.xlsx", &minimal_xlsx(&["rent", "payroll"]));

    let (stdout, stderr, success) = run_cqa(&config_path, &["segments", &path]);
    assert!(success, "segments failed: {}", stderr);
    assert!(stdout.contains("rent payroll 42"));
}

#[test]
fn file_support_malformed_pdf_fails() {
    let (tmp, config_path) = setup_file_support_env();
    let path = write_file(&tmp, "broken.pdf", b"this is not a pdf");

    let (stdout, stderr, success) = run_cqa(&config_path, &["segments", &path]);
    assert!(!success);
    assert!(stdout.is_empty());
    assert!(stderr.contains("PDF extraction failed"), "got: {}", stderr);
}

#[test]
fn file_support_docx_without_document_part_fails() {
    let (tmp, config_path) = setup_file_support_env();
    let bytes = zip_with(&[("word/other.xml", "<x/>".to_string())]);
    let path = write_file(&tmp, "empty.docx", &bytes);

    let (_, stderr, success) = run_cqa(&config_path, &["segments", &path]);
    assert!(!success);
    assert!(stderr.contains("word/document.xml not found"), "got: {}", stderr);
}

#[test]
fn file_support_docx_tab_separates_words() {
    let (tmp, config_path) = setup_file_support_env();
    let xml = "<?xml version=\"1.0\"?><w:document xmlns:w=\"urn:w\"><w:body>\
               <w:p><w:r><w:t>Name</w:t><w:tab/><w:t>Value</w:t><w:br/>\
               <w:t>Port</w:t><w:tab/><w:t>8080</w:t></w:r></w:p>\
               </w:body></w:document>";
    let bytes = zip_with(&[("word/document.xml", xml.to_string())]);
    let path = write_file(&tmp, "table.docx", &bytes);

    let (stdout, stderr, success) = run_cqa(&config_path, &["segments", &path]);
    assert!(success, "segments failed: {}", stderr);
    assert!(stdout.contains("[segment 0] (4 words)\nName Value Port 8080\n"), "got: {}", stdout);
}
