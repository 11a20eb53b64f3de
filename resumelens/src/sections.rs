//! Splits converted resume text into the known sections and turns each section into display
//! blocks.
//!
//! Everything here is a pure function over strings. The heuristics live in explicit pattern
//! tables (`HEADING_KEYWORDS`, `CONTACT_PATTERNS`, `GENERIC_HEADERS`) so they can be tested
//! without rendering anything.

use crate::models::ConvertResult;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKey {
    Contact,
    Summary,
    Experience,
    Education,
    Skills,
    Projects,
    Certifications,
    Awards,
}

/// Render order
pub const SECTION_ORDER: [SectionKey; 8] = [
    SectionKey::Contact,
    SectionKey::Summary,
    SectionKey::Experience,
    SectionKey::Education,
    SectionKey::Skills,
    SectionKey::Projects,
    SectionKey::Certifications,
    SectionKey::Awards,
];

impl SectionKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKey::Contact => "contact",
            SectionKey::Summary => "summary",
            SectionKey::Experience => "experience",
            SectionKey::Education => "education",
            SectionKey::Skills => "skills",
            SectionKey::Projects => "projects",
            SectionKey::Certifications => "certifications",
            SectionKey::Awards => "awards",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            SectionKey::Contact => "Contact",
            SectionKey::Summary => "Professional Summary",
            SectionKey::Experience => "Experience",
            SectionKey::Education => "Education",
            SectionKey::Skills => "Skills",
            SectionKey::Projects => "Projects",
            SectionKey::Certifications => "Certifications",
            SectionKey::Awards => "Awards",
        }
    }

    /// Sections whose paragraphs open with a role/degree/project line worth bolding
    pub fn has_entry_headings(&self) -> bool {
        matches!(
            self,
            SectionKey::Experience | SectionKey::Education | SectionKey::Projects
        )
    }
}

impl FromStr for SectionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SECTION_ORDER
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown section: {}", s))
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Heading words recognized when splitting flat text, in lookup order.
pub const HEADING_KEYWORDS: [(SectionKey, &[&str]); 8] = [
    (
        SectionKey::Contact,
        &["contact", "personal information", "contact info", "contact information"],
    ),
    (
        SectionKey::Summary,
        &["summary", "objective", "profile", "professional summary", "career objective"],
    ),
    (
        SectionKey::Experience,
        &[
            "experience",
            "work experience",
            "professional experience",
            "employment",
            "employment history",
            "work history",
        ],
    ),
    (
        SectionKey::Education,
        &["education", "academic background", "qualifications"],
    ),
    (
        SectionKey::Skills,
        &["skills", "technical skills", "core competencies", "competencies", "abilities"],
    ),
    (
        SectionKey::Certifications,
        &["certifications", "certificates", "licenses", "licenses & certifications"],
    ),
    (
        SectionKey::Projects,
        &["projects", "personal projects", "portfolio", "key projects"],
    ),
    (
        SectionKey::Awards,
        &["awards", "honors", "achievements", "honors & awards"],
    ),
];

/// Lines that label the document rather than the person
pub const GENERIC_HEADERS: [&str; 6] = [
    "RESUME",
    "RÉSUMÉ",
    "CV",
    "CURRICULUM VITAE",
    "PROFILE",
    "CONTACT",
];

/// Sections shorter than this (trimmed, in characters) are not rendered
pub const MIN_SECTION_CHARS: usize = 3;

/// First lines at least this long are not treated as entry headings
pub const MAX_HEADING_CHARS: usize = 100;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    Email,
    Link,
    Phone,
    Text,
}

impl ContactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactKind::Email => "email",
            ContactKind::Link => "link",
            ContactKind::Phone => "phone",
            ContactKind::Text => "text",
        }
    }
}

lazy_static! {
    /// Checked in order; first match wins, no match is `ContactKind::Text`.
    pub static ref CONTACT_PATTERNS: Vec<(Regex, ContactKind)> = vec![
        (Regex::new(r"@").unwrap(), ContactKind::Email),
        (
            Regex::new(r"(?i)https?://|www\.|linkedin|github").unwrap(),
            ContactKind::Link
        ),
        (
            Regex::new(r"(?:\d[\s().+/-]*){7,}").unwrap(),
            ContactKind::Phone
        ),
    ];
    static ref UNDERLINE_RE: Regex = Regex::new(r"^[=_\-~*]{3,}$").unwrap();
    static ref BULLET_RE: Regex = Regex::new(r"^\s*(?:[-*•●○■□▪▫–]+\s*|\d{1,2}[.)]\s+)").unwrap();
    static ref PARAGRAPH_BREAK_RE: Regex = Regex::new(r"\n[ \t]*\n").unwrap();
    static ref CONTACT_SEPARATOR_RE: Regex = Regex::new(r"\s*[|•·]\s*").unwrap();
    static ref EDGE_PUNCT_RE: Regex = Regex::new(r"^[\s:*#\-=]+|[\s:*#\-=]+$").unwrap();
}

pub fn classify_contact(line: &str) -> ContactKind {
    CONTACT_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(line))
        .map(|(_, kind)| *kind)
        .unwrap_or(ContactKind::Text)
}

fn strip_edges(line: &str) -> String {
    EDGE_PUNCT_RE.replace_all(line.trim(), "").to_string()
}

pub fn is_generic_header(line: &str) -> bool {
    let norm = strip_edges(line).to_uppercase();
    GENERIC_HEADERS.iter().any(|g| *g == norm)
}

/// Recognizes a section heading line. Matches whole lines only ("Experience", "WORK HISTORY:"),
/// so body text that happens to mention a keyword stays body text.
pub fn identify_heading(line: &str) -> Option<SectionKey> {
    let norm = strip_edges(line).to_lowercase();
    if norm.is_empty() || norm.chars().count() >= 50 {
        return None;
    }
    HEADING_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| *w == norm))
        .map(|(key, _)| *key)
}

/// Strips a leading bullet or list number
pub fn strip_bullet(line: &str) -> String {
    BULLET_RE.replace(line, "").trim().to_string()
}

/// Structured decomposition of a converted resume. Immutable once built.
#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize)]
pub struct ResumeDocument {
    pub contact: String,
    pub summary: String,
    pub experience: String,
    pub education: String,
    pub skills: String,
    pub projects: String,
    pub certifications: String,
    pub awards: String,
}

impl ResumeDocument {
    pub fn blank() -> Self {
        Default::default()
    }

    pub fn get(&self, key: SectionKey) -> &str {
        match key {
            SectionKey::Contact => &self.contact,
            SectionKey::Summary => &self.summary,
            SectionKey::Experience => &self.experience,
            SectionKey::Education => &self.education,
            SectionKey::Skills => &self.skills,
            SectionKey::Projects => &self.projects,
            SectionKey::Certifications => &self.certifications,
            SectionKey::Awards => &self.awards,
        }
    }

    fn slot(&mut self, key: SectionKey) -> &mut String {
        match key {
            SectionKey::Contact => &mut self.contact,
            SectionKey::Summary => &mut self.summary,
            SectionKey::Experience => &mut self.experience,
            SectionKey::Education => &mut self.education,
            SectionKey::Skills => &mut self.skills,
            SectionKey::Projects => &mut self.projects,
            SectionKey::Certifications => &mut self.certifications,
            SectionKey::Awards => &mut self.awards,
        }
    }

    /// From a pre-split section map. Unrecognized keys are dropped.
    pub fn from_sections(sections: &BTreeMap<String, String>) -> Self {
        let mut doc = Self::blank();
        for (name, content) in sections.iter() {
            match SectionKey::from_str(&name.trim().to_lowercase()) {
                Ok(key) => *doc.slot(key) = content.trim().to_string(),
                Err(_) => debug!("ignoring unrecognized section {:?}", name),
            }
        }
        doc
    }

    /// Splits flat text on heading lines. Anything before the first heading is contact info;
    /// converter underlines ("=====") are dropped; blank lines inside a section are kept so
    /// paragraphs survive.
    pub fn from_text(text: &str) -> Self {
        let mut doc = Self::blank();
        let mut current = SectionKey::Contact;
        let mut buckets: BTreeMap<SectionKey, Vec<&str>> = BTreeMap::new();
        for raw in text.lines() {
            let line = raw.trim();
            if UNDERLINE_RE.is_match(line) {
                continue;
            }
            if let Some(key) = identify_heading(line) {
                current = key;
                continue;
            }
            buckets.entry(current).or_default().push(line);
        }
        for (key, lines) in buckets.into_iter() {
            let joined = lines.join("\n");
            let slot = doc.slot(key);
            if !slot.is_empty() {
                slot.push_str("\n\n");
            }
            slot.push_str(joined.trim());
        }
        doc
    }

    /// Prefers the server's section map; falls back to splitting the converted text.
    pub fn from_conversion(result: &ConvertResult) -> Self {
        match &result.sections {
            Some(map) if !map.is_empty() => Self::from_sections(map),
            _ => Self::from_text(&result.ats_resume),
        }
    }

    /// The sections that would be rendered, in render order
    pub fn present_sections(&self) -> Vec<SectionKey> {
        SECTION_ORDER
            .iter()
            .filter(|k| self.get(**k).trim().chars().count() >= MIN_SECTION_CHARS)
            .copied()
            .collect()
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct ContactLine {
    pub kind: ContactKind,
    pub text: String,
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize)]
pub struct ContactHeader {
    pub name: Option<String>,
    pub lines: Vec<ContactLine>,
}

/// First non-generic line becomes the name; the rest are split on separators and classified.
pub fn parse_contact(contact: &str) -> ContactHeader {
    let mut header = ContactHeader::default();
    for line in contact.lines().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        if is_generic_header(line) {
            continue;
        }
        if header.name.is_none() {
            header.name = Some(line.to_string());
            continue;
        }
        for item in CONTACT_SEPARATOR_RE
            .split(line)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
        {
            header.lines.push(ContactLine {
                kind: classify_contact(item),
                text: item.to_string(),
            });
        }
    }
    header
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct Paragraph {
    pub heading: Option<String>,
    pub lines: Vec<String>,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub enum SectionBody {
    Contact(ContactHeader),
    Bullets(Vec<String>),
    Paragraphs(Vec<Paragraph>),
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct DisplaySection {
    pub key: SectionKey,
    pub title: &'static str,
    pub body: SectionBody,
}

pub fn bullet_items(content: &str) -> Vec<String> {
    content
        .lines()
        .map(strip_bullet)
        .filter(|l| !l.is_empty())
        .collect()
}

pub fn paragraphs(key: SectionKey, content: &str) -> Vec<Paragraph> {
    PARAGRAPH_BREAK_RE
        .split(content.trim())
        .filter_map(|chunk| {
            let mut lines: Vec<String> = chunk
                .lines()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .map(|l| l.to_string())
                .collect();
            if lines.is_empty() {
                return None;
            }
            let heading = if key.has_entry_headings()
                && lines[0].chars().count() < MAX_HEADING_CHARS
            {
                Some(lines.remove(0))
            } else {
                None
            };
            Some(Paragraph { heading, lines })
        })
        .collect()
}

/// Display blocks for every section that clears `MIN_SECTION_CHARS`, in render order.
pub fn display_sections(doc: &ResumeDocument) -> Vec<DisplaySection> {
    doc.present_sections()
        .into_iter()
        .map(|key| {
            let content = doc.get(key);
            let body = match key {
                SectionKey::Contact => SectionBody::Contact(parse_contact(content)),
                SectionKey::Skills => SectionBody::Bullets(bullet_items(content)),
                _ => SectionBody::Paragraphs(paragraphs(key, content)),
            };
            DisplaySection {
                key,
                title: key.title(),
                body,
            }
        })
        .collect()
}
