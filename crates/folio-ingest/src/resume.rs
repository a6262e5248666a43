//! Resume document to chunks
//!
//! Text is extracted with pdf-extract (or read as-is for `.txt`/`.md`),
//! split into sections at recognised header lines, and each section is
//! chunked as prose under `resume/<section>`.

use crate::chunker::Chunker;
use crate::{IngestError, Result};
use folio_core::Chunk;
use std::path::Path;

/// Header vocabulary, matched against the uppercased line
pub const SECTION_HEADERS: &[&str] = &[
    "EXPERIENCE",
    "WORK EXPERIENCE",
    "PROFESSIONAL EXPERIENCE",
    "EDUCATION",
    "ACADEMIC BACKGROUND",
    "SKILLS",
    "TECHNICAL SKILLS",
    "CORE COMPETENCIES",
    "PROJECTS",
    "KEY PROJECTS",
    "ACADEMIC PROJECTS",
    "CERTIFICATIONS",
    "CERTIFICATES",
    "ACHIEVEMENTS",
    "AWARDS",
    "HONORS",
    "SUMMARY",
    "OBJECTIVE",
    "PROFILE",
    "PUBLICATIONS",
    "RESEARCH",
    "VOLUNTEER",
    "LEADERSHIP",
    "ACTIVITIES",
    "INTERESTS",
    "HOBBIES",
];

/// Section for content before the first header
pub const DEFAULT_SECTION: &str = "OVERVIEW";

/// Longest line still considered a header
const MAX_HEADER_LEN: usize = 50;

fn is_header(line: &str) -> bool {
    let upper = line.trim().to_uppercase();
    upper.chars().count() < MAX_HEADER_LEN
        && SECTION_HEADERS.iter().any(|h| upper.starts_with(h))
}

/// Split resume text into `(section, content)` pairs in document order
///
/// A header seen twice keeps its first position and accumulates both bodies.
pub fn split_sections(text: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, Vec<&str>)> = Vec::new();
    let mut current = DEFAULT_SECTION.to_string();
    let mut lines: Vec<&str> = Vec::new();

    fn flush<'a>(sections: &mut Vec<(String, Vec<&'a str>)>, name: &str, lines: &mut Vec<&'a str>) {
        if lines.is_empty() {
            return;
        }
        match sections.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => existing.append(lines),
            None => sections.push((name.to_string(), std::mem::take(lines))),
        }
    }

    for line in text.lines() {
        if is_header(line) {
            flush(&mut sections, &current, &mut lines);
            current = line.trim().to_uppercase();
        } else {
            lines.push(line);
        }
    }
    flush(&mut sections, &current, &mut lines);

    sections
        .into_iter()
        .map(|(name, body)| (name, body.join("\n").trim().to_string()))
        .filter(|(_, body)| !body.is_empty())
        .collect()
}

/// Source label for a section name
pub fn section_source(section: &str) -> String {
    format!("resume/{}", section.to_lowercase().replace(' ', "_"))
}

/// Chunk already-extracted resume text
pub fn resume_chunks(text: &str, chunker: &Chunker) -> Vec<Chunk> {
    let sections = split_sections(text);
    let chunks: Vec<Chunk> = sections
        .iter()
        .flat_map(|(name, body)| chunker.chunk_prose(body, &section_source(name)))
        .collect();

    tracing::info!(
        "Resume indexed: {} chunks from {} sections",
        chunks.len(),
        sections.len()
    );
    chunks
}

/// Extract plain text from a resume file
pub fn extract_text(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let io_err = |e| IngestError::IoError {
        path: path.display().to_string(),
        source: e,
    };

    match ext.as_str() {
        "pdf" => {
            let bytes = std::fs::read(path).map_err(io_err)?;
            pdf_extract::extract_text_from_mem(&bytes)
                .map_err(|e| IngestError::PdfError(e.to_string()))
        }
        "txt" | "md" | "markdown" => std::fs::read_to_string(path).map_err(io_err),
        other => Err(IngestError::UnsupportedFormat(other.to_string())),
    }
}

/// Load and chunk a resume, returning no chunks if it is absent or unreadable
pub fn load_resume_chunks(path: &Path, chunker: &Chunker) -> Vec<Chunk> {
    if !path.exists() {
        tracing::warn!(
            "Resume not found at {}. Skipping resume indexing.",
            path.display()
        );
        return Vec::new();
    }

    match extract_text(path) {
        Ok(text) => {
            tracing::info!("Resume extracted: {} chars", text.chars().count());
            resume_chunks(&text, chunker)
        }
        Err(e) => {
            tracing::error!("Failed to extract resume {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::ChunkType;
    use std::io::Write;

    const RESUME: &str = "Ava Stone\nava@example.com\n\nWork Experience\nAcme Corp, Engineer\nBuilt search.\n\nSKILLS\nRust, Go\n\nEducation\nBSc Computer Science\n";

    #[test]
    fn test_split_sections() {
        let sections = split_sections(RESUME);
        let names: Vec<&str> = sections.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["OVERVIEW", "WORK EXPERIENCE", "SKILLS", "EDUCATION"]);
        assert_eq!(sections[0].1, "Ava Stone\nava@example.com");
        assert_eq!(sections[2].1, "Rust, Go");
    }

    #[test]
    fn test_long_lines_are_not_headers() {
        let line = "Summary of a decade spent building distributed systems at scale";
        assert!(!is_header(line));
        assert!(is_header("  summary  "));
        assert!(is_header("Technical Skills & Tools"));
    }

    #[test]
    fn test_repeated_header_accumulates() {
        let sections = split_sections("SKILLS\nRust\nPROJECTS\nFolio\nSKILLS\nGo\n");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0], ("SKILLS".to_string(), "Rust\nGo".to_string()));
    }

    #[test]
    fn test_source_labels() {
        let chunks = resume_chunks(RESUME, &Chunker::new());
        let sources: Vec<&str> = chunks.iter().map(|c| c.source()).collect();
        assert_eq!(
            sources,
            vec![
                "resume/overview",
                "resume/work_experience",
                "resume/skills",
                "resume/education"
            ]
        );
        assert!(chunks.iter().all(|c| c.chunk_type() == ChunkType::Prose));
    }

    #[test]
    fn test_missing_file_yields_no_chunks() {
        let chunks = load_resume_chunks(Path::new("/nope/resume.pdf"), &Chunker::new());
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_plain_text_resume() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(RESUME.as_bytes()).unwrap();

        let chunks = load_resume_chunks(&path, &Chunker::new());
        assert_eq!(chunks.len(), 4);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.docx");
        std::fs::write(&path, b"binary").unwrap();

        assert!(matches!(
            extract_text(&path),
            Err(IngestError::UnsupportedFormat(_))
        ));
        assert!(load_resume_chunks(&path, &Chunker::new()).is_empty());
    }
}
