use crate::{Error, Result};
use std::path::Path;

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["pdf", "doc", "docx", "txt"];

/// Matches the server's `MAX_CONTENT_LENGTH`
pub const MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// A resume file that passed client-side checks, read into memory for a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeFile {
    pub filename: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

fn mime_for(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "text/plain",
    }
}

/// Checks name and size only; says nothing about whether the content parses.
pub fn check_upload(filename: &str, size: u64) -> Result<&'static str> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| {
            Error::Validation(format!(
                "{filename}: missing file extension (allowed: PDF, DOC, DOCX, TXT)"
            ))
        })?;
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(Error::Validation(format!(
            "{filename}: invalid file type (allowed: PDF, DOC, DOCX, TXT)"
        )));
    }
    if size == 0 {
        return Err(Error::Validation(format!("{filename}: file is empty")));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(Error::Validation(format!(
            "{filename}: file is too large ({} bytes, limit {} MiB)",
            size,
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }
    Ok(mime_for(&ext))
}

impl ResumeFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Validation(format!("not a file path: {}", path.display())))?
            .to_string();
        let size = std::fs::metadata(path)?.len();
        let mime = check_upload(&filename, size)?;
        let bytes = std::fs::read(path)?;
        Ok(ResumeFile {
            filename,
            mime,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_upload() {
        assert_eq!(check_upload("cv.PDF", 1000).unwrap(), "application/pdf");
        assert_eq!(check_upload("cv.txt", 1).unwrap(), "text/plain");
        assert!(check_upload("cv.png", 1000).is_err());
        assert!(check_upload("cv", 1000).is_err());
        assert!(check_upload("cv.docx", 0).is_err());
        assert!(check_upload("cv.docx", MAX_UPLOAD_BYTES).is_ok());
        assert!(check_upload("cv.docx", MAX_UPLOAD_BYTES + 1).is_err());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.txt");
        std::fs::write(&path, "Jane Doe\njane@example.com").unwrap();
        let file = ResumeFile::from_path(&path).unwrap();
        assert_eq!(file.filename, "resume.txt");
        assert_eq!(file.bytes.len(), 25);

        let empty = dir.path().join("empty.pdf");
        std::fs::write(&empty, "").unwrap();
        assert!(matches!(
            ResumeFile::from_path(&empty),
            Err(Error::Validation(_))
        ));
    }
}
