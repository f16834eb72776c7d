//! PDF report generation
//!
//! Builds the paginated financial report: a branded header band, a metrics
//! summary table, the crop-profitability table, and the top-10 farmer
//! table. If the configured logo image cannot be loaded the header falls
//! back to text-only branding; the report is still produced.

use anyhow::{Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use std::path::Path;

use crate::aggregate::{top_n, top_performer};
use crate::constants;
use crate::reports::ReportData;

// A4 in points
const PAGE_WIDTH: f64 = 595.0;
const PAGE_HEIGHT: f64 = 842.0;
const MARGIN: f64 = 50.0;
const LINE_HEIGHT: f64 = 16.0;
const BAND_HEIGHT: f64 = 70.0;

/// Header band fill (dark green)
const BAND_COLOR: (f64, f64, f64) = (0.13, 0.35, 0.21);
/// Table header row fill
const HEADER_ROW_COLOR: (f64, f64, f64) = (0.88, 0.92, 0.88);

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

/// Accumulates content operations page by page, tracking a vertical cursor
struct PageComposer {
    pages: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    y: f64,
}

impl PageComposer {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    /// Close the current page and start a fresh one
    fn break_page(&mut self) {
        let ops = std::mem::take(&mut self.current);
        self.pages.push(ops);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    /// Break the page if fewer than `needed` points remain; returns true
    /// when a break happened so table headers can be redrawn
    fn ensure_space(&mut self, needed: f64) -> bool {
        if self.y - needed < MARGIN {
            self.break_page();
            return true;
        }
        false
    }

    fn advance(&mut self, dy: f64) {
        self.y -= dy;
    }

    fn text(&mut self, x: f64, y: f64, size: f64, bold: bool, s: &str) {
        let font = if bold { "F2" } else { "F1" };
        self.current.push(Operation::new("BT", vec![]));
        self.current
            .push(Operation::new("Tf", vec![font.into(), real(size)]));
        self.current
            .push(Operation::new("Td", vec![real(x), real(y)]));
        self.current
            .push(Operation::new("Tj", vec![Object::string_literal(s)]));
        self.current.push(Operation::new("ET", vec![]));
    }

    fn text_color(&mut self, x: f64, y: f64, size: f64, bold: bool, color: (f64, f64, f64), s: &str) {
        self.current.push(Operation::new("q", vec![]));
        self.current.push(Operation::new(
            "rg",
            vec![real(color.0), real(color.1), real(color.2)],
        ));
        self.text(x, y, size, bold, s);
        self.current.push(Operation::new("Q", vec![]));
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: (f64, f64, f64)) {
        self.current.push(Operation::new("q", vec![]));
        self.current.push(Operation::new(
            "rg",
            vec![real(color.0), real(color.1), real(color.2)],
        ));
        self.current
            .push(Operation::new("re", vec![real(x), real(y), real(w), real(h)]));
        self.current.push(Operation::new("f", vec![]));
        self.current.push(Operation::new("Q", vec![]));
    }

    fn hline(&mut self, x1: f64, x2: f64, y: f64) {
        self.current.push(Operation::new("q", vec![]));
        self.current.push(Operation::new("w", vec![real(0.5)]));
        self.current
            .push(Operation::new("m", vec![real(x1), real(y)]));
        self.current
            .push(Operation::new("l", vec![real(x2), real(y)]));
        self.current.push(Operation::new("S", vec![]));
        self.current.push(Operation::new("Q", vec![]));
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        self.pages.push(self.current);
        self.pages
    }
}

/// Draw a section heading and move the cursor below it
fn section_title(c: &mut PageComposer, title: &str) {
    c.ensure_space(3.0 * LINE_HEIGHT);
    c.advance(LINE_HEIGHT);
    c.text(MARGIN, c.y, 13.0, true, title);
    c.advance(6.0);
    c.hline(MARGIN, PAGE_WIDTH - MARGIN, c.y);
    c.advance(LINE_HEIGHT);
}

/// Draw one table row at the cursor
fn table_row(c: &mut PageComposer, col_x: &[f64], cells: &[String], bold: bool) {
    for (x, cell) in col_x.iter().zip(cells) {
        c.text(*x, c.y, 10.0, bold, cell);
    }
    c.advance(LINE_HEIGHT);
}

/// Draw the shaded header row of a table
fn table_header(c: &mut PageComposer, col_x: &[f64], headers: &[&str]) {
    c.fill_rect(
        MARGIN - 4.0,
        c.y - 4.0,
        PAGE_WIDTH - 2.0 * MARGIN + 8.0,
        LINE_HEIGHT,
        HEADER_ROW_COLOR,
    );
    let cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    table_row(c, col_x, &cells, true);
}

/// Draw a full table, redrawing the header row after page breaks
fn draw_table(c: &mut PageComposer, col_x: &[f64], headers: &[&str], rows: &[Vec<String>]) {
    c.ensure_space(4.0 * LINE_HEIGHT);
    table_header(c, col_x, headers);
    for row in rows {
        if c.ensure_space(LINE_HEIGHT + 4.0) {
            table_header(c, col_x, headers);
        }
        table_row(c, col_x, row, false);
    }
}

/// Compose every page of the report into content operations
fn compose(c: &mut PageComposer, data: &ReportData, generated_on: &str, logo_loaded: bool) {
    let config = data.config;

    // Header band. The logo image (when it loads) is placed over the band
    // after page assembly; the text keeps clear of that corner either way.
    c.fill_rect(0.0, PAGE_HEIGHT - BAND_HEIGHT, PAGE_WIDTH, BAND_HEIGHT, BAND_COLOR);
    c.text_color(
        MARGIN,
        PAGE_HEIGHT - 32.0,
        20.0,
        true,
        (1.0, 1.0, 1.0),
        &config.farm_name,
    );
    let subtitle = if logo_loaded {
        format!("Financial Report - {}", generated_on)
    } else {
        // Text-only branding fallback
        format!("{} Financial Report - {}", config.app_name, generated_on)
    };
    c.text_color(
        MARGIN,
        PAGE_HEIGHT - 52.0,
        11.0,
        false,
        (1.0, 1.0, 1.0),
        &subtitle,
    );
    c.y = PAGE_HEIGHT - BAND_HEIGHT - 20.0;

    // Metrics summary
    let total_revenue: f64 = data.sales.iter().map(|s| s.revenue()).sum();
    let total_expenses: f64 = data.expenses.iter().map(|e| e.amount).sum();
    let net_profit = total_revenue - total_expenses;
    let overall_roi = if total_expenses > 0.0 {
        net_profit / total_expenses * 100.0
    } else {
        0.0
    };
    let best = top_performer(data.farmers)
        .map(|b| format!("{} ({})", b.name, b.region))
        .unwrap_or_else(|| "-".to_string());

    section_title(c, "Metrics Summary");
    let metric_cols = [MARGIN, 230.0];
    let metrics = [
        ("Total Revenue", config.money(total_revenue)),
        ("Total Expenses", config.money(total_expenses)),
        ("Net Profit", config.money(net_profit)),
        ("Overall ROI", format!("{:.1}%", overall_roi)),
        ("Farmers", data.farmers.len().to_string()),
        ("Sales Records", data.sales.len().to_string()),
        ("Expense Records", data.expenses.len().to_string()),
        ("Top Performer", best),
    ];
    for (label, value) in metrics {
        c.ensure_space(LINE_HEIGHT + 4.0);
        table_row(c, &metric_cols, &[label.to_string(), value], false);
    }

    // Crop profitability
    section_title(c, "Crop Profitability");
    let crop_cols = [MARGIN, 160.0, 250.0, 340.0, 430.0, 500.0];
    let crop_rows: Vec<Vec<String>> = data
        .crops
        .iter()
        .map(|crop| {
            vec![
                crop.crop.clone(),
                config.money(crop.revenue),
                config.money(crop.expenses),
                config.money(crop.profit),
                format!("{:.1}%", crop.roi_percent),
                crop.farmer_count.to_string(),
            ]
        })
        .collect();
    draw_table(
        c,
        &crop_cols,
        &["Crop", "Revenue", "Expenses", "Profit", "ROI", "Farmers"],
        &crop_rows,
    );

    // Top farmers
    section_title(c, "Top Farmers");
    let farmer_cols = [MARGIN, 80.0, 220.0, 310.0, 390.0, 470.0];
    let farmer_rows: Vec<Vec<String>> = top_n(data.farmers, constants::PDF_TOP_N)
        .iter()
        .enumerate()
        .map(|(rank, row)| {
            vec![
                (rank + 1).to_string(),
                row.name.clone(),
                row.region.clone(),
                config.money(row.revenue),
                config.money(row.profit),
                format!("{:.1}%", row.roi_percent),
            ]
        })
        .collect();
    draw_table(
        c,
        &farmer_cols,
        &["#", "Name", "Region", "Revenue", "Profit", "ROI"],
        &farmer_rows,
    );
}

/// Write the financial report PDF
pub fn write_financial_report(path: &Path, data: &ReportData, generated_on: &str) -> Result<()> {
    // Load the logo up front so the header text can fall back when it fails
    let logo = match &data.config.logo_path {
        Some(logo_path) => match lopdf::xobject::image(logo_path) {
            Ok(image) => Some(image),
            Err(e) => {
                eprintln!(
                    "  Warning: could not load logo {}: {} (using text-only header)",
                    logo_path.display(),
                    e
                );
                None
            }
        },
        None => None,
    };

    let mut composer = PageComposer::new();
    compose(&mut composer, data, generated_on, logo.is_some());
    let page_contents = composer.finish();

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    // Resources go on each page (not the Pages node) so that embedding the
    // logo XObject extends the page's own resource dictionary
    let resources = dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    };

    let mut kids: Vec<Object> = Vec::new();
    let mut page_ids = Vec::new();
    for operations in page_contents {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources.clone(),
        });
        kids.push(page_id.into());
        page_ids.push(page_id);
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![real(0.0), real(0.0), real(PAGE_WIDTH), real(PAGE_HEIGHT)],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    // Place the logo in the band's right corner of the first page
    if let (Some(image), Some(&first_page)) = (logo, page_ids.first()) {
        let position = (PAGE_WIDTH as f32 - 100.0, PAGE_HEIGHT as f32 - 60.0);
        let size = (50.0, 50.0);
        if let Err(e) = doc.insert_image(first_page, image, position, size) {
            eprintln!("  Warning: could not embed logo: {} (using text-only header)", e);
        }
    }

    doc.compress();
    doc.save(path)
        .with_context(|| format!("Failed to write PDF: {}", path.display()))?;

    Ok(())
}

/// Build the report filename: `<AppName>-<Report-Kind>-<ISO date>.pdf`
pub fn report_filename(app_name: &str, date: &str) -> String {
    format!("{}-{}-{}.pdf", app_name, constants::PDF_REPORT_KIND, date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::build_report;
    use crate::config::{Config, FileConfig};
    use crate::records::{Farmer, Sale};

    fn test_config(logo: Option<&str>) -> Config {
        let file_config: FileConfig = toml::from_str(&format!(
            r#"
            [api]
            base_url = "http://localhost"
            {}
            "#,
            logo
                .map(|l| format!("[report]\nlogo_path = \"{}\"", l))
                .unwrap_or_default()
        ))
        .unwrap();
        Config::from_file(&file_config, None)
    }

    fn test_data_pdf(path: &std::path::Path, config: &Config) {
        let farmers = vec![Farmer {
            id: "f1".to_string(),
            name: "A. Perera".to_string(),
            email: String::new(),
            region: "Ampara".to_string(),
            created_at: None,
        }];
        let varieties = vec!["Nadu".to_string()];
        let sales = vec![Sale {
            id: "s1".to_string(),
            farmer_id: "f1".to_string(),
            crop: "Nadu".to_string(),
            quantity_kg: 10.0,
            unit_price: 50.0,
            buyer_name: String::new(),
            buyer_contact: String::new(),
            date: Some("2026-01-15".to_string()),
        }];
        let report = build_report(&farmers, &varieties, &sales, &[]);

        let data = ReportData {
            farmers: &report.farmers,
            crops: &report.crops,
            sales: &sales,
            expenses: &[],
            stats: &report.stats,
            config,
        };

        write_financial_report(path, &data, "2026-08-07").unwrap();
    }

    #[test]
    fn test_report_is_a_loadable_pdf() {
        let path = std::env::temp_dir().join("harvest-finances-report.pdf");
        let config = test_config(None);
        test_data_pdf(&path, &config);

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));

        let loaded = Document::load(&path).unwrap();
        assert!(!loaded.get_pages().is_empty());
    }

    #[test]
    fn test_missing_logo_falls_back_to_text_header() {
        let path = std::env::temp_dir().join("harvest-finances-report-nologo.pdf");
        let config = test_config(Some("/nonexistent/logo.jpg"));
        // Must still produce a report, not an error
        test_data_pdf(&path, &config);
        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF-"));
    }

    #[test]
    fn test_report_filename_pattern() {
        assert_eq!(
            report_filename("HarvestEase", "2026-08-07"),
            "HarvestEase-Financial-Report-2026-08-07.pdf"
        );
    }
}
