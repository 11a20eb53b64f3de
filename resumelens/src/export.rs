//! Renders a converted resume to a downloadable file.
//!
//! Exports are one-shot: any failure comes back as a single `Error::Export` and nothing is
//! retried or partially written.

use crate::models::ConvertResult;
use crate::sections::{display_sections, DisplaySection, ResumeDocument, SectionBody};
use crate::{Error, Result};
use askama::Template;
use log::info;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExportFormat {
    Txt,
    Html,
    Pdf,
    Docx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Html => "html",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
        }
    }

    /// Guesses the format from an output file name
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| ExportFormat::from_str(&e.to_ascii_lowercase()).ok())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "txt" => Ok(ExportFormat::Txt),
            "html" => Ok(ExportFormat::Html),
            "pdf" => Ok(ExportFormat::Pdf),
            "docx" => Ok(ExportFormat::Docx),
            _ => Err(Error::Validation(format!(
                "unknown export format: {} (expected txt, html, pdf or docx)",
                s
            ))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

#[derive(Template)]
#[template(path = "ats_resume.html")]
pub struct ResumeHtmlView<'a> {
    pub title: String,
    pub sections: &'a [DisplaySection],
}

fn document_title(sections: &[DisplaySection]) -> String {
    sections
        .iter()
        .find_map(|s| match &s.body {
            SectionBody::Contact(header) => header.name.clone(),
            _ => None,
        })
        .unwrap_or_else(|| "ATS Resume".to_string())
}

pub fn export(result: &ConvertResult, format: ExportFormat) -> Result<Vec<u8>> {
    let sections = || display_sections(&ResumeDocument::from_conversion(result));
    match format {
        ExportFormat::Txt => Ok(result.ats_resume.clone().into_bytes()),
        ExportFormat::Html => render_html(&sections()).map(String::into_bytes),
        ExportFormat::Pdf => render_pdf(&sections()),
        ExportFormat::Docx => render_docx(&sections()),
    }
}

pub fn export_to_path(result: &ConvertResult, format: ExportFormat, path: &Path) -> Result<()> {
    let bytes = export(result, format)?;
    std::fs::write(path, &bytes)
        .map_err(|e| Error::Export(format!("writing {}: {e}", path.display())))?;
    info!("exported {} ({} bytes) to {}", format, bytes.len(), path.display());
    Ok(())
}

pub fn render_html(sections: &[DisplaySection]) -> Result<String> {
    ResumeHtmlView {
        title: document_title(sections),
        sections,
    }
    .render()
    .map_err(|e| Error::Export(format!("html template: {e}")))
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LineStyle {
    Name,
    SectionTitle,
    EntryHeading,
    Body,
}

impl LineStyle {
    fn font_size(&self) -> f32 {
        match self {
            LineStyle::Name => 18.0,
            LineStyle::SectionTitle => 12.0,
            LineStyle::EntryHeading | LineStyle::Body => 10.0,
        }
    }

    fn bold(&self) -> bool {
        !matches!(self, LineStyle::Body)
    }

    /// Wrap width in characters for the A4 text column
    fn wrap_width(&self) -> usize {
        match self {
            LineStyle::Name => 50,
            LineStyle::SectionTitle => 75,
            LineStyle::EntryHeading | LineStyle::Body => 95,
        }
    }
}

/// Flattened text layout shared by the PDF and DOCX renderers.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct StyledLine {
    pub style: LineStyle,
    pub text: String,
}

fn styled(style: LineStyle, text: impl Into<String>) -> StyledLine {
    StyledLine {
        style,
        text: text.into(),
    }
}

pub fn layout_lines(sections: &[DisplaySection]) -> Vec<StyledLine> {
    let mut out = Vec::new();
    for section in sections {
        match &section.body {
            SectionBody::Contact(header) => {
                if let Some(name) = &header.name {
                    out.push(styled(LineStyle::Name, name.as_str()));
                }
                if !header.lines.is_empty() {
                    let joined: Vec<&str> = header.lines.iter().map(|l| l.text.as_str()).collect();
                    out.push(styled(LineStyle::Body, joined.join(" | ")));
                }
            }
            SectionBody::Bullets(items) => {
                out.push(styled(LineStyle::SectionTitle, section.title.to_uppercase()));
                for item in items {
                    out.push(styled(LineStyle::Body, format!("- {}", item)));
                }
            }
            SectionBody::Paragraphs(paragraphs) => {
                out.push(styled(LineStyle::SectionTitle, section.title.to_uppercase()));
                for para in paragraphs {
                    if let Some(heading) = &para.heading {
                        out.push(styled(LineStyle::EntryHeading, heading.as_str()));
                    }
                    for line in &para.lines {
                        out.push(styled(LineStyle::Body, line.as_str()));
                    }
                }
            }
        }
    }
    out
}

/// Greedy word wrap; words longer than `width` get a line to themselves.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 18.0;
const PT_TO_MM: f32 = 0.3528;

pub fn render_pdf(sections: &[DisplaySection]) -> Result<Vec<u8>> {
    use printpdf::{BuiltinFont, Mm, PdfDocument};

    let title = document_title(sections);
    let (doc, page, layer) = PdfDocument::new(
        title.as_str(),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| Error::Export(format!("pdf font: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| Error::Export(format!("pdf font: {e}")))?;

    let mut current = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT_MM - MARGIN_MM;
    for line in layout_lines(sections) {
        let size = line.style.font_size();
        let line_height = size * PT_TO_MM * 1.4;
        if line.style == LineStyle::SectionTitle {
            y -= line_height * 0.6;
        }
        let font = if line.style.bold() { &bold } else { &regular };
        for chunk in wrap(&line.text, line.style.wrap_width()) {
            if y - line_height < MARGIN_MM {
                let (next_page, next_layer) =
                    doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
                current = doc.get_page(next_page).get_layer(next_layer);
                y = PAGE_HEIGHT_MM - MARGIN_MM;
            }
            y -= line_height;
            current.use_text(chunk, size, Mm(MARGIN_MM), Mm(y), font);
        }
    }
    doc.save_to_bytes()
        .map_err(|e| Error::Export(format!("pdf: {e}")))
}

pub fn render_docx(sections: &[DisplaySection]) -> Result<Vec<u8>> {
    use docx_rs::{AlignmentType, Docx, Paragraph, Run};

    let mut docx = Docx::new();
    for line in layout_lines(sections) {
        // docx sizes are in half-points
        let mut run = Run::new()
            .add_text(line.text.as_str())
            .size((line.style.font_size() * 2.0) as usize);
        if line.style.bold() {
            run = run.bold();
        }
        let mut para = Paragraph::new().add_run(run);
        if line.style == LineStyle::Name {
            para = para.align(AlignmentType::Center);
        }
        docx = docx.add_paragraph(para);
    }
    let mut buf = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buf)
        .map_err(|e| Error::Export(format!("docx: {e}")))?;
    Ok(buf.into_inner())
}
