//! Plain text console rendering.

use std::fmt::Write;

use super::{MarginExtreme, Report};

const MAX_FONT_ROWS: usize = 20;
const MAX_IMAGE_ROWS: usize = 20;
const MAX_MARGIN_ROWS: usize = 25;
const MAX_ANOMALY_ROWS: usize = 25;

/// Render a report in the line-oriented console layout.
///
/// The verdict line is not included; see [`verdict`].
pub fn to_text(report: &Report) -> String {
    let mut out = String::new();
    // fmt::Write for String never fails
    let _ = write_report(&mut out, report);
    out
}

/// `RESULT PASS` or `RESULT FAIL failures=N`.
pub fn verdict(report: &Report) -> String {
    if report.passed {
        "RESULT PASS".to_string()
    } else {
        format!("RESULT FAIL failures={}", report.failure_count())
    }
}

fn write_report(out: &mut String, report: &Report) -> std::fmt::Result {
    if let Some(source) = &report.source {
        writeln!(out, "pdf={}", source)?;
    }
    writeln!(
        out,
        "pages={} encrypted={}",
        report.page_count, report.encrypted
    )?;
    write_info(out, report)?;

    writeln!(
        out,
        "trim={:.4}in x {:.4}in (mediabox)",
        report.trim.width_in, report.trim.height_in
    )?;
    if let (Some(expected), false) = (report.trim.expected, report.trim.matches) {
        writeln!(
            out,
            "FAIL trim_expected={}in x {}in",
            expected.width_in, expected.height_in
        )?;
    }

    if report.page_sizes.len() > 1 {
        writeln!(out, "FAIL inconsistent_page_sizes:")?;
        for size in &report.page_sizes {
            writeln!(
                out,
                "  {}x{}pt count={}",
                size.width_pt, size.height_pt, size.count
            )?;
        }
    }

    writeln!(
        out,
        "annotations={} form_fields={}",
        report.annotations, report.form_fields
    )?;

    if report.fonts_not_embedded.is_empty() {
        writeln!(out, "fonts_embedded_ok unique_fonts={}", report.unique_fonts)?;
    } else {
        writeln!(
            out,
            "FAIL fonts_not_embedded={}",
            report.fonts_not_embedded.len()
        )?;
        for font in report.fonts_not_embedded.iter().take(MAX_FONT_ROWS) {
            writeln!(
                out,
                "  xref={} name={} reason={}",
                font.xref.number, font.name, font.reason
            )?;
        }
        write_ellipsis(out, report.fonts_not_embedded.len(), MAX_FONT_ROWS)?;
    }

    if report.low_dpi_images.is_empty() {
        writeln!(out, "images_dpi_ok (all >= {} or none)", report.dpi_threshold)?;
    } else {
        writeln!(
            out,
            "FAIL low_dpi_images={} (threshold {})",
            report.low_dpi_images.len(),
            report.dpi_threshold
        )?;
        for image in report.low_dpi_images.iter().take(MAX_IMAGE_ROWS) {
            writeln!(
                out,
                "  p{:03} xref={} px={}x{} dpi={:.1} cs={}",
                image.page,
                image.xref.number,
                image.pixel_width,
                image.pixel_height,
                image.dpi,
                image.colorspace
            )?;
        }
        write_ellipsis(out, report.low_dpi_images.len(), MAX_IMAGE_ROWS)?;
    }

    let worst = &report.worst_margins;
    writeln!(
        out,
        "worst_margins_in top={} bottom={} inside={} outside={}",
        extreme(worst.top),
        extreme(worst.bottom),
        extreme(worst.inside),
        extreme(worst.outside)
    )?;
    let t = &report.thresholds;
    writeln!(
        out,
        "thresholds_in top>={} bottom>={} outside>={} inside>={}",
        t.top, t.bottom, t.outside, t.inside
    )?;

    if report.margin_violations.is_empty() {
        writeln!(out, "margins_ok (heuristic)")?;
    } else {
        writeln!(
            out,
            "FAIL margin_violations={}",
            report.margin_violations.len()
        )?;
        for v in report.margin_violations.iter().take(MAX_MARGIN_ROWS) {
            writeln!(
                out,
                "  p{:03} top={:.3} bottom={:.3} inside={:.3} outside={:.3}",
                v.page, v.margins.top, v.margins.bottom, v.margins.inside, v.margins.outside
            )?;
        }
        write_ellipsis(out, report.margin_violations.len(), MAX_MARGIN_ROWS)?;
    }

    if !report.unreadable_pages.is_empty() {
        writeln!(
            out,
            "FAIL unreadable_content={}",
            report.unreadable_pages.len()
        )?;
        for anomaly in report.unreadable_pages.iter().take(MAX_ANOMALY_ROWS) {
            writeln!(out, "  p{:03} reason={}", anomaly.page, anomaly.reason)?;
        }
        write_ellipsis(out, report.unreadable_pages.len(), MAX_ANOMALY_ROWS)?;
    }

    Ok(())
}

fn write_info(out: &mut String, report: &Report) -> std::fmt::Result {
    let info = &report.info;
    let mut fields = Vec::new();
    if let Some(version) = &info.pdf_version {
        fields.push(format!("version={}", version));
    }
    if let Some(producer) = &info.producer {
        fields.push(format!("producer={}", producer));
    }
    if let Some(creator) = &info.creator {
        fields.push(format!("creator={}", creator));
    }
    if let Some(created) = &info.created {
        fields.push(format!("created={}", created.format("%Y-%m-%d")));
    }
    if !fields.is_empty() {
        writeln!(out, "{}", fields.join(" "))?;
    }
    Ok(())
}

fn write_ellipsis(out: &mut String, total: usize, shown: usize) -> std::fmt::Result {
    if total > shown {
        writeln!(out, "  ...")?;
    }
    Ok(())
}

fn extreme(value: Option<MarginExtreme>) -> String {
    match value {
        Some(m) => format!("{:.3}(p{})", m.value, m.page),
        None => "n/a".to_string(),
    }
}
