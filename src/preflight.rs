//! Preflight driver.
//!
//! Pages are independent: each one is analysed into a [`PageTally`] and the
//! tallies are merged in page order. Fonts are collected across pages and
//! resolved once per handle at the end.

use std::collections::BTreeSet;

use rayon::prelude::*;

use crate::analysis::geometry::content_bbox;
use crate::analysis::margins::{classify, pt_to_in, MarginViolation};
use crate::analysis::thresholds::MarginThresholds;
use crate::analysis::{fonts, images};
use crate::backend::DocumentAccessor;
use crate::options::{PreflightOptions, TrimSize};
use crate::report::{FailureCategory, PageAnomaly, PageTally, Report, TrimCheck, WorstMargins};

/// Run every check against `doc`, optionally requiring the first page to
/// match `expected_trim`.
pub fn run<A: DocumentAccessor + ?Sized>(doc: &A, expected_trim: Option<TrimSize>) -> Report {
    run_with_options(doc, &PreflightOptions::new().with_expected_trim(expected_trim))
}

/// Run every check with explicit options.
pub fn run_with_options<A: DocumentAccessor + ?Sized>(
    doc: &A,
    options: &PreflightOptions,
) -> Report {
    let page_count = doc.page_count();
    let thresholds = MarginThresholds::for_page_count(page_count);
    let analyse = |page| analyse_page(doc, page, &thresholds, options.min_block_size_pt);

    let tally = if options.parallel {
        (1..=page_count)
            .into_par_iter()
            .map(analyse)
            .reduce(PageTally::default, PageTally::merge)
    } else {
        (1..=page_count)
            .map(analyse)
            .fold(PageTally::default(), PageTally::merge)
    };

    let trim = check_trim(doc, options.expected_trim);
    let page_sizes = tally.page_sizes();
    let fonts_not_embedded = fonts::find_unembedded(doc, &tally.fonts, options.parallel);

    let mut failures = Vec::new();
    if !trim.matches {
        failures.push(FailureCategory::TrimMismatch);
    }
    if page_sizes.len() > 1 {
        failures.push(FailureCategory::InconsistentPageSizes);
    }
    if !fonts_not_embedded.is_empty() {
        failures.push(FailureCategory::FontsNotEmbedded);
    }
    if !tally.low_dpi.is_empty() {
        failures.push(FailureCategory::LowDpiImages);
    }
    if !tally.violations.is_empty() {
        failures.push(FailureCategory::MarginViolations);
    }
    if !tally.anomalies.is_empty() {
        failures.push(FailureCategory::UnreadableContent);
    }
    let passed = failures.is_empty();

    log::info!(
        "preflight: {} pages, {} fonts ({} not embedded), {} low-dpi images, {} margin violations, {} unreadable pages, {} failing checks",
        page_count,
        tally.fonts.len(),
        fonts_not_embedded.len(),
        tally.low_dpi.len(),
        tally.violations.len(),
        tally.anomalies.len(),
        failures.len()
    );

    Report {
        source: None,
        info: doc.info(),
        page_count,
        encrypted: doc.is_encrypted(),
        trim,
        page_sizes,
        annotations: tally.annotations,
        form_fields: tally.form_fields,
        unique_fonts: tally.fonts.len(),
        fonts_not_embedded,
        dpi_threshold: images::MIN_IMAGE_DPI,
        low_dpi_images: tally.low_dpi,
        thresholds,
        worst_margins: tally.worst,
        margin_violations: tally.violations,
        unreadable_pages: tally.anomalies,
        failures,
        passed,
    }
}

fn analyse_page<A: DocumentAccessor + ?Sized>(
    doc: &A,
    page: u32,
    thresholds: &MarginThresholds,
    min_block_size_pt: f64,
) -> PageTally {
    let mut tally = PageTally::new();
    let (width, height) = doc.page_box(page);
    tally.add_size(page, width, height);
    tally.annotations = doc.annotations(page);
    tally.form_fields = doc.form_fields(page);

    for font in doc.fonts_used(page) {
        tally.add_font(font.handle, font.name);
    }

    for reason in doc.page_anomalies(page) {
        tally.anomalies.push(PageAnomaly::new(page, reason));
    }

    let mut seen = BTreeSet::new();
    for image in doc.images_used(page) {
        if !seen.insert(image.handle) {
            continue;
        }
        let rects = doc.placement_rects(page, image.handle);
        if let Some(low) = images::evaluate(page, &image, &rects) {
            tally.low_dpi.push(low);
        }
    }

    match content_bbox(&doc.content_blocks(page), min_block_size_pt) {
        Some(bbox) => {
            let margins = classify(&bbox, width, height, page);
            tally.worst = WorstMargins::from_page(page, &margins);
            if thresholds.is_violated_by(&margins) {
                tally.violations.push(MarginViolation { page, margins });
            }
        }
        None => log::debug!("page {}: no content, skipping margins", page),
    }

    tally
}

fn check_trim<A: DocumentAccessor + ?Sized>(doc: &A, expected: Option<TrimSize>) -> TrimCheck {
    let (width, height) = doc.page_box(1);
    TrimCheck {
        width_in: pt_to_in(width),
        height_in: pt_to_in(height),
        expected,
        matches: expected.map_or(true, |trim| trim.matches(width, height)),
    }
}
