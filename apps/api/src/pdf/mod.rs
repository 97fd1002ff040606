//! CV → PDF rendering.
//!
//! Layout is computed first as positioned text runs (pure, testable), then
//! written out with printpdf using the built-in Helvetica faces.

pub mod font_metrics;
pub mod storage;

use chrono::{DateTime, Utc};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use thiserror::Error;

use crate::models::cv::Cv;
use font_metrics::{get_metrics, PdfFont};

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF rendering failed: {0}")]
    Render(String),
}

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const FOOTER_MM: f32 = 12.0;
const PT_TO_MM: f32 = 0.352_778;
const LINE_SPACING: f32 = 1.35;

const TITLE_SIZE: f32 = 20.0;
const HEADING_SIZE: f32 = 13.0;
const BODY_SIZE: f32 = 11.0;
const FOOTER_SIZE: f32 = 8.0;

const SECTION_GAP_MM: f32 = 5.0;

/// One line of text at an absolute position (baseline, from the bottom-left corner).
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub font: PdfFont,
    pub size_pt: f32,
    pub x_mm: f32,
    pub y_mm: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub runs: Vec<TextRun>,
}

fn text_width_mm() -> f32 {
    PAGE_WIDTH_MM - 2.0 * MARGIN_MM
}

fn line_height_mm(size_pt: f32) -> f32 {
    size_pt * LINE_SPACING * PT_TO_MM
}

/// Replaces anything the base-14 fonts cannot show with `?`. Tabs become spaces
/// and CRLF or lone CR line endings become `\n`.
pub fn sanitize_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .chars()
        .map(|c| match c {
            '\t' => ' ',
            '\n' | '\r' => '\n',
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201c}' | '\u{201d}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            c if (' '..='~').contains(&c) => c,
            _ => '?',
        })
        .collect()
}

struct LayoutCursor {
    pages: Vec<PageLayout>,
    y_mm: f32,
}

impl LayoutCursor {
    fn new() -> Self {
        Self {
            pages: vec![PageLayout::default()],
            y_mm: PAGE_HEIGHT_MM - MARGIN_MM,
        }
    }

    fn remaining_mm(&self) -> f32 {
        self.y_mm - (MARGIN_MM + FOOTER_MM)
    }

    fn new_page(&mut self) {
        self.pages.push(PageLayout::default());
        self.y_mm = PAGE_HEIGHT_MM - MARGIN_MM;
    }

    fn ensure_room(&mut self, needed_mm: f32) {
        let on_fresh_page = self.y_mm >= PAGE_HEIGHT_MM - MARGIN_MM;
        if self.remaining_mm() < needed_mm && !on_fresh_page {
            self.new_page();
        }
    }

    fn push_line(&mut self, text: String, font: PdfFont, size_pt: f32) {
        let height = line_height_mm(size_pt);
        self.ensure_room(height);
        self.y_mm -= height;
        if !text.is_empty() {
            if let Some(page) = self.pages.last_mut() {
                page.runs.push(TextRun {
                    text,
                    font,
                    size_pt,
                    x_mm: MARGIN_MM,
                    y_mm: self.y_mm,
                });
            }
        }
    }

    fn push_paragraph(&mut self, text: &str, font: PdfFont, size_pt: f32) {
        let max_width_em = text_width_mm() / (size_pt * PT_TO_MM);
        for line in get_metrics(font).wrap_lines(text, max_width_em) {
            self.push_line(line, font, size_pt);
        }
    }

    fn gap(&mut self, mm: f32) {
        self.y_mm -= mm;
    }
}

/// Lays out a CV: name as title, then Bio, Skills, Projects and Contacts
/// sections, then a footer with page numbers and generation time on every page.
pub fn layout_cv(cv: &Cv, generated_at: DateTime<Utc>) -> Vec<PageLayout> {
    let mut cursor = LayoutCursor::new();

    let title = sanitize_text(&cv.full_name());
    let title = if title.is_empty() { "Untitled CV".to_string() } else { title };
    cursor.push_paragraph(&title, PdfFont::HelveticaBold, TITLE_SIZE);
    cursor.gap(SECTION_GAP_MM);

    let sections = [
        ("Bio", &cv.bio),
        ("Skills", &cv.skills),
        ("Projects", &cv.projects),
        ("Contacts", &cv.contacts),
    ];

    for (heading, body) in sections {
        // Keep the heading together with the first body line.
        cursor.ensure_room(line_height_mm(HEADING_SIZE) + line_height_mm(BODY_SIZE));
        cursor.push_line(heading.to_string(), PdfFont::HelveticaBold, HEADING_SIZE);

        let body = sanitize_text(body.trim());
        let body = if body.is_empty() { "Not provided".to_string() } else { body };
        cursor.push_paragraph(&body, PdfFont::Helvetica, BODY_SIZE);
        cursor.gap(SECTION_GAP_MM);
    }

    let mut pages = cursor.pages;
    let total = pages.len();
    let stamp = generated_at.format("%Y-%m-%d %H:%M UTC");
    for (index, page) in pages.iter_mut().enumerate() {
        page.runs.push(TextRun {
            text: format!("Generated {stamp} - Page {} of {total}", index + 1),
            font: PdfFont::Helvetica,
            size_pt: FOOTER_SIZE,
            x_mm: MARGIN_MM,
            y_mm: MARGIN_MM,
        });
    }
    pages
}

fn render_err<E: std::fmt::Debug>(e: E) -> PdfError {
    PdfError::Render(format!("{e:?}"))
}

/// Renders on the blocking pool so layout and encoding stay off the async workers.
pub async fn render_cv_pdf_blocking(cv: &Cv, generated_at: DateTime<Utc>) -> Result<Vec<u8>, PdfError> {
    let cv = cv.clone();
    tokio::task::spawn_blocking(move || render_cv_pdf(&cv, generated_at))
        .await
        .map_err(|e| PdfError::Render(e.to_string()))?
}

/// Renders a CV to PDF bytes.
pub fn render_cv_pdf(cv: &Cv, generated_at: DateTime<Utc>) -> Result<Vec<u8>, PdfError> {
    let pages = layout_cv(cv, generated_at);
    let (doc, first_page, first_layer) = PdfDocument::new(
        format!("CV - {}", sanitize_text(&cv.full_name())),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(render_err)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(render_err)?;

    let mut targets = vec![(first_page, first_layer)];
    for n in 1..pages.len() {
        targets.push(doc.add_page(
            Mm(PAGE_WIDTH_MM),
            Mm(PAGE_HEIGHT_MM),
            format!("Layer {}", n + 1),
        ));
    }

    for (page, (page_index, layer_index)) in pages.iter().zip(targets) {
        let layer = doc.get_page(page_index).get_layer(layer_index);
        for run in &page.runs {
            let font = match run.font {
                PdfFont::Helvetica => &regular,
                PdfFont::HelveticaBold => &bold,
            };
            layer.use_text(run.text.clone(), run.size_pt, Mm(run.x_mm), Mm(run.y_mm), font);
        }
    }

    doc.save_to_bytes().map_err(render_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cv::sample_cv;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    fn texts(page: &PageLayout) -> Vec<&str> {
        page.runs.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn test_layout_starts_with_bold_title() {
        let pages = layout_cv(&sample_cv(1, None), at());
        let first = &pages[0].runs[0];
        assert_eq!(first.text, "Ada Lovelace");
        assert_eq!(first.font, PdfFont::HelveticaBold);
        assert_eq!(first.size_pt, TITLE_SIZE);
    }

    #[test]
    fn test_layout_marks_empty_sections() {
        let mut cv = sample_cv(1, None);
        cv.projects = "  ".to_string();
        let pages = layout_cv(&cv, at());
        let all = texts(&pages[0]);
        let projects = all.iter().position(|t| *t == "Projects").unwrap();
        assert_eq!(all[projects + 1], "Not provided");
    }

    #[test]
    fn test_short_cv_fits_one_page_with_footer() {
        let pages = layout_cv(&sample_cv(1, None), at());
        assert_eq!(pages.len(), 1);
        let footer = pages[0].runs.last().unwrap();
        assert_eq!(footer.text, "Generated 2024-05-01 09:30 UTC - Page 1 of 1");
    }

    #[test]
    fn test_long_cv_breaks_pages_within_margins() {
        let mut cv = sample_cv(1, None);
        cv.bio = "Led the migration of a monolith to services. ".repeat(300);
        let pages = layout_cv(&cv, at());
        assert!(pages.len() > 1, "expected multiple pages");

        for page in &pages {
            for run in &page.runs {
                assert!(run.y_mm >= MARGIN_MM, "run below margin: {run:?}");
                assert!(run.y_mm <= PAGE_HEIGHT_MM - MARGIN_MM);
                let width_mm = get_metrics(run.font).measure_str(&run.text) * run.size_pt * PT_TO_MM;
                assert!(width_mm <= text_width_mm() + 0.01, "run too wide: {run:?}");
            }
        }
        let last_footer = pages.last().unwrap().runs.last().unwrap();
        assert!(last_footer.text.ends_with(&format!("Page {} of {}", pages.len(), pages.len())));
    }

    #[test]
    fn test_sanitize_replaces_unsupported_characters() {
        assert_eq!(sanitize_text("Zoë\t“CV” – 2024"), "Zo? \"CV\" - 2024");
    }

    #[test]
    fn test_crlf_line_endings_become_plain_lines() {
        assert_eq!(sanitize_text("Rust\r\nSQL\rGo"), "Rust\nSQL\nGo");

        let mut cv = sample_cv(1, None);
        cv.bio = "Rust\r\nSQL".to_string();
        let pages = layout_cv(&cv, at());
        let all = texts(&pages[0]);
        let bio = all.iter().position(|t| *t == "Bio").unwrap();
        assert_eq!(&all[bio + 1..bio + 3], ["Rust", "SQL"]);
    }

    #[tokio::test]
    async fn test_blocking_render_produces_pdf() {
        let cv = sample_cv(1, None);
        let bytes = render_cv_pdf_blocking(&cv, at()).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_render_produces_pdf_bytes() {
        let bytes = render_cv_pdf(&sample_cv(1, None), at()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }
}
