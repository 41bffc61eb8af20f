//! Heading-delimited section splitting for canvas documents.
//!
//! A document is cut into a flat list of sections at every ATX heading line
//! (`#` through `######`). Heading levels are recorded but never nest.
//! Text above the first heading becomes a synthetic "Introduction" section;
//! a document with no headings at all becomes a single "Content" section.
//! Synthetic sections carry level `0` and render without a heading line.

use crate::error::{PlaybookError, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const INTRODUCTION_HEADING: &str = "Introduction";
pub const CONTENT_HEADING: &str = "Content";

/// One addressable slice of a canvas document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub heading: String,
    pub level: u8,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<DateTime<Utc>>,
}

impl Section {
    fn new(index: usize, heading: impl Into<String>, level: u8, body: &[&str]) -> Self {
        Self {
            id: format!("s{index}"),
            heading: heading.into(),
            level,
            content: body.join("\n").trim().to_string(),
            locked_by: None,
            locked_at: None,
        }
    }

    /// True for the "Introduction"/"Content" sections that have no heading line.
    pub fn is_synthetic(&self) -> bool {
        self.level == 0
    }
}

static HEADING_RE: OnceLock<Regex> = OnceLock::new();

fn heading_re() -> &'static Regex {
    HEADING_RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.+)$").unwrap())
}

/// Split `markdown` into sections in document order.
pub fn parse_markdown_sections(markdown: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current: Option<(String, u8)> = None;
    let mut body: Vec<&str> = Vec::new();

    for line in markdown.lines() {
        let Some(caps) = heading_re().captures(line) else {
            body.push(line);
            continue;
        };

        match current.take() {
            Some((heading, level)) => {
                sections.push(Section::new(sections.len() + 1, heading, level, &body));
            }
            None => {
                if body.iter().any(|l| !l.trim().is_empty()) {
                    sections.push(Section::new(
                        sections.len() + 1,
                        INTRODUCTION_HEADING,
                        0,
                        &body,
                    ));
                }
            }
        }
        body.clear();

        let level = caps[1].len() as u8;
        current = Some((caps[2].trim().to_string(), level));
    }

    if let Some((heading, level)) = current {
        sections.push(Section::new(sections.len() + 1, heading, level, &body));
    } else if !markdown.trim().is_empty() {
        sections.push(Section::new(1, CONTENT_HEADING, 0, &body));
    }

    sections
}

/// Reassemble sections into a markdown document.
pub fn render_sections(sections: &[Section]) -> String {
    let blocks: Vec<String> = sections
        .iter()
        .map(|s| {
            if s.is_synthetic() {
                s.content.clone()
            } else if s.content.is_empty() {
                format!("{} {}", "#".repeat(s.level as usize), s.heading)
            } else {
                format!(
                    "{} {}\n\n{}",
                    "#".repeat(s.level as usize),
                    s.heading,
                    s.content
                )
            }
        })
        .filter(|b| !b.is_empty())
        .collect();

    let mut out = blocks.join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Replace the body of one section and return the re-rendered document.
pub fn replace_section(markdown: &str, section_id: &str, new_body: &str) -> Result<String> {
    let mut sections = parse_markdown_sections(markdown);
    let section = sections
        .iter_mut()
        .find(|s| s.id == section_id)
        .ok_or_else(|| PlaybookError::SectionNotFound(section_id.to_string()))?;
    section.content = new_body.trim().to_string();
    Ok(render_sections(&sections))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
