//! Paginated PDF rendering of care plans

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};
use serde::Serialize;
use std::fmt::Display;
use std::io::BufWriter;

use super::{DocumentRenderer, ServiceError};
use crate::care_plan::{CarePlan, Language};
use crate::patient::PatientSummary;

const SERVICE: &str = "document renderer";

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

pub const DEFAULT_LINE_WIDTH: usize = 90;
pub const DEFAULT_LINES_PER_PAGE: usize = 48;

// ============================================================================
// Page geometry (A4, millimetres)
// ============================================================================

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const TOP_MM: f32 = 277.0;
const LINE_HEIGHT_MM: f32 = 5.0;
const FOOTER_MM: f32 = 12.0;
const LAYER: &str = "Layer 1";

/// Body lines that fit between the top margin and the footer
pub const MAX_LINES_PER_PAGE: usize = ((TOP_MM - MARGIN_MM) / LINE_HEIGHT_MM) as usize;

const TITLE_PT: f32 = 16.0;
const HEADING_PT: f32 = 12.0;
const BODY_PT: f32 = 10.0;
const FOOTER_PT: f32 = 8.0;

/// Everything printed on a care-plan document
#[derive(Debug, Clone, Serialize)]
pub struct CarePlanDocument {
    pub patient: PatientSummary,
    pub language: Language,
    pub plan: CarePlan,
}

impl CarePlanDocument {
    pub fn file_stem(&self) -> String {
        match self.patient.subject_id {
            Some(id) => format!("patient_{}_careplan", id),
            None => "careplan".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    pub pages: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineStyle {
    Title,
    Heading,
    Body,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    text: String,
    style: LineStyle,
}

impl Line {
    fn body(text: String) -> Self {
        Self {
            text,
            style: LineStyle::Body,
        }
    }

    fn blank() -> Self {
        Self::body(String::new())
    }
}

fn footer(page: usize, total: usize) -> String {
    format!("Page {} of {}", page, total)
}

fn render_error(reason: impl Display) -> ServiceError {
    ServiceError::Render {
        service: SERVICE,
        reason: reason.to_string(),
    }
}

/// Renders A4 pages in the built-in Helvetica faces, each ending in a
/// "Page n of m" footer
#[derive(Debug, Clone)]
pub struct PdfDocumentRenderer {
    line_width: usize,
    lines_per_page: usize,
}

impl Default for PdfDocumentRenderer {
    fn default() -> Self {
        Self {
            line_width: DEFAULT_LINE_WIDTH,
            lines_per_page: DEFAULT_LINES_PER_PAGE,
        }
    }
}

impl PdfDocumentRenderer {
    /// `line_width` is in characters, `lines_per_page` counts body lines
    pub fn new(line_width: usize, lines_per_page: usize) -> Self {
        Self {
            line_width,
            lines_per_page,
        }
    }

    fn body_lines(&self, document: &CarePlanDocument) -> Vec<Line> {
        let labels = document.language.labels();
        let patient = &document.patient;
        let plan = &document.plan;
        let width = self.line_width;
        let mut lines = vec![
            Line {
                text: labels.title.to_string(),
                style: LineStyle::Title,
            },
            Line::blank(),
        ];

        let subject = patient
            .subject_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let age = patient
            .age
            .map(|a| a.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let diagnosis = patient.diagnosis.as_deref().unwrap_or("Unknown");

        let push_wrapped = |lines: &mut Vec<Line>, text: &str, indent: &str| {
            lines.extend(wrap(text, width, indent).into_iter().map(Line::body));
        };

        push_wrapped(&mut lines, &format!("Patient ID: {}", subject), "");
        push_wrapped(&mut lines, &format!("Age: {}", age), "");
        push_wrapped(&mut lines, &format!("Diagnosis: {}", diagnosis), "");
        push_wrapped(
            &mut lines,
            &format!("{}: {}", labels.risk, plan.risk_level.explanation),
            "",
        );

        let mut section = |heading: &str, paragraphs: Vec<String>, bullets: bool| {
            lines.push(Line::blank());
            lines.push(Line {
                text: heading.to_string(),
                style: LineStyle::Heading,
            });
            for paragraph in paragraphs {
                if bullets {
                    push_wrapped(&mut lines, &format!("- {}", paragraph), "  ");
                } else {
                    push_wrapped(&mut lines, &paragraph, "");
                }
            }
        };

        section(labels.summary, vec![diagnosis.to_string()], false);

        let mut risk = vec![plan.risk_level.explanation.clone()];
        risk.extend(plan.risk_level.things_to_watch.iter().map(|t| format!("- {}", t)));
        section(labels.risk, risk, false);

        section(
            labels.follow_up,
            plan.follow_up_plan
                .iter()
                .map(|f| format!("{} - {}: {}", f.appointment, f.date, f.instructions))
                .collect(),
            true,
        );

        section(
            labels.monitoring,
            plan.monitoring
                .weight_check
                .iter()
                .chain(plan.monitoring.symptoms_to_watch.iter())
                .cloned()
                .collect(),
            true,
        );

        section(labels.tips, plan.tips.clone(), true);

        lines
    }

    /// Body lines split into pages; never empty
    fn layout(&self, document: &CarePlanDocument) -> Result<Vec<Vec<Line>>, ServiceError> {
        if self.line_width < 20 || !(1..=MAX_LINES_PER_PAGE).contains(&self.lines_per_page) {
            return Err(render_error(format!(
                "page of {} lines x {} columns does not fit on A4 (at most {} lines, at least 20 columns)",
                self.lines_per_page, self.line_width, MAX_LINES_PER_PAGE
            )));
        }

        let body = self.body_lines(document);
        let mut pages: Vec<Vec<Line>> = body
            .chunks(self.lines_per_page)
            .map(<[Line]>::to_vec)
            .collect();
        if pages.is_empty() {
            pages.push(Vec::new());
        }
        Ok(pages)
    }
}

impl DocumentRenderer for PdfDocumentRenderer {
    fn render(&self, document: &CarePlanDocument) -> Result<RenderedDocument, ServiceError> {
        let pages = self.layout(document)?;
        let total = pages.len();

        let title = document.language.labels().title;
        let (doc, first_page, first_layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER);
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(render_error)?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(render_error)?;

        for (i, lines) in pages.iter().enumerate() {
            let (page, layer) = if i == 0 {
                (first_page, first_layer)
            } else {
                doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER)
            };
            let layer = doc.get_page(page).get_layer(layer);

            let mut y = TOP_MM;
            for line in lines {
                if !line.text.is_empty() {
                    let (font, size): (&IndirectFontRef, f32) = match line.style {
                        LineStyle::Title => (&bold, TITLE_PT),
                        LineStyle::Heading => (&bold, HEADING_PT),
                        LineStyle::Body => (&regular, BODY_PT),
                    };
                    layer.use_text(line.text.as_str(), size, Mm(MARGIN_MM), Mm(y), font);
                }
                y -= LINE_HEIGHT_MM;
            }

            layer.use_text(
                footer(i + 1, total),
                FOOTER_PT,
                Mm(MARGIN_MM),
                Mm(FOOTER_MM),
                &regular,
            );
        }

        let mut buf = BufWriter::new(Vec::new());
        doc.save(&mut buf).map_err(render_error)?;
        let bytes = buf.into_inner().map_err(|e| render_error(e.error()))?;

        Ok(RenderedDocument {
            file_name: format!("{}.pdf", document.file_stem()),
            content_type: PDF_CONTENT_TYPE,
            bytes,
            pages: total,
        })
    }
}

/// Greedy word wrap; continuation lines start with `indent`
fn wrap(text: &str, width: usize, indent: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut len = 0;
    let mut has_word = false;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if has_word && len + 1 + word_len > width {
            lines.push(std::mem::take(&mut current));
            current.push_str(indent);
            len = indent.chars().count();
            has_word = false;
        }
        if has_word {
            current.push(' ');
            len += 1;
        }
        current.push_str(word);
        len += word_len;
        has_word = true;
    }

    if has_word || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::care_plan::{FollowUp, RiskLevel};
    use crate::patient::RiskCategory;

    fn document(tips: usize) -> CarePlanDocument {
        CarePlanDocument {
            patient: PatientSummary {
                subject_id: Some(12),
                age: Some(66),
                diagnosis: Some("PNEUMONIA".to_string()),
                risk_category: RiskCategory::High,
            },
            language: Language::English,
            plan: CarePlan {
                risk_level: RiskLevel {
                    explanation: "High chance of coming back".to_string(),
                    things_to_watch: vec!["Fever".to_string()],
                },
                follow_up_plan: vec![FollowUp {
                    appointment: "GP".to_string(),
                    date: "Monday".to_string(),
                    instructions: "Bring this report".to_string(),
                }],
                tips: (0..tips).map(|i| format!("Tip number {}", i)).collect(),
                ..CarePlan::default()
            },
        }
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("a bb ccc", 4, ""), vec!["a bb", "ccc"]);
        assert_eq!(wrap("- one two three", 8, "  "), vec!["- one", "  two", "  three"]);
        assert_eq!(wrap("", 10, ""), vec![""]);
    }

    fn text(page: &[Line]) -> Vec<&str> {
        page.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_layout_keeps_sections_in_order() {
        let pages = PdfDocumentRenderer::default().layout(&document(2)).unwrap();
        assert_eq!(pages.len(), 1);

        let lines = text(&pages[0]);
        assert_eq!(pages[0][0].style, LineStyle::Title);
        assert_eq!(lines[0], "Post-Discharge Care Report");
        assert!(lines.contains(&"Patient ID: 12"));
        assert!(lines.contains(&"- GP - Monday: Bring this report"));
        assert!(lines.contains(&"- Tip number 1"));

        let headings: Vec<&str> = pages[0]
            .iter()
            .filter(|l| l.style == LineStyle::Heading)
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(headings.len(), 5);
    }

    #[test]
    fn test_layout_paginates() {
        let pages = PdfDocumentRenderer::new(80, 20).layout(&document(60)).unwrap();

        assert!(pages.len() > 1);
        for page in &pages {
            assert!(!page.is_empty());
            assert!(page.len() <= 20);
        }
        assert_eq!(footer(2, 4), "Page 2 of 4");
    }

    #[test]
    fn test_render_pdf() {
        let rendered = PdfDocumentRenderer::default().render(&document(2)).unwrap();

        assert_eq!(rendered.pages, 1);
        assert_eq!(rendered.file_name, "patient_12_careplan.pdf");
        assert_eq!(rendered.content_type, "application/pdf");
        assert!(rendered.bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_render_pdf_with_several_pages() {
        let renderer = PdfDocumentRenderer::new(80, 20);
        let expected = renderer.layout(&document(60)).unwrap().len();
        let rendered = renderer.render(&document(60)).unwrap();

        assert_eq!(rendered.pages, expected);
        assert!(rendered.bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_page_that_does_not_fit_is_rejected() {
        assert!(PdfDocumentRenderer::new(10, 20).render(&document(1)).is_err());
        assert!(PdfDocumentRenderer::new(80, 0).render(&document(1)).is_err());
        let too_tall = PdfDocumentRenderer::new(80, MAX_LINES_PER_PAGE + 1);
        assert!(too_tall.render(&document(1)).is_err());
    }
}
