//! Benchmarks for podcheck preflight performance.
//!
//! Run with: cargo bench
//!
//! Documents are synthetic: in-memory layouts for the analysis itself, and
//! lopdf-built files for loading and extraction.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lopdf::{dictionary, Document, Object, Stream};
use podcheck::{
    BBox, ContentBlock, ImageInfo, LopdfBackend, MemoryDocument, MemoryPage, ObjectRef,
    PreflightOptions, TrimSize,
};

/// A book of `page_count` pages with a body block, a few fonts and an
/// image every tenth page.
fn create_memory_book(page_count: u32) -> MemoryDocument {
    let mut doc = MemoryDocument::new();
    for n in 0..page_count {
        let inset = 30.0 + f64::from(n % 13);
        let mut page = MemoryPage::inches(5.5, 8.5)
            .with_block(ContentBlock::text(BBox::new(
                inset,
                inset,
                396.0 - inset,
                612.0 - inset,
            )))
            .with_font(ObjectRef::new(1 + n % 5, 0), format!("F{}", n % 5));
        if n % 10 == 0 {
            let image = ImageInfo {
                handle: ObjectRef::new(100 + n, 0),
                pixel_width: 1200,
                pixel_height: 800,
                colorspace: "DeviceRGB".to_string(),
            };
            page = page.with_image(image, vec![(288.0, 192.0), (144.0, 96.0)]);
        }
        doc.add_page(page);
    }
    for n in 1..=5 {
        doc.set_key(ObjectRef::new(n, 0), "Subtype", "/Type1");
        doc.set_key(ObjectRef::new(n, 0), "FontDescriptor", format!("{} 0 R", 50 + n));
        doc.set_key(ObjectRef::new(50 + n, 0), "FontFile", "99 0 R");
    }
    doc
}

/// A lopdf-built file with `page_count` text pages.
fn create_test_pdf(page_count: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for n in 0..page_count {
        let content = format!(
            "BT /F1 11 Tf 14 TL 54 560 Td (Page {} of the benchmark book) Tj T* (Second line of body text) Tj ET",
            n + 1
        );
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => i64::from(page_count),
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 396.into(), 612.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    let _ = doc.save_to(&mut out);
    out
}

/// Benchmark header sniffing.
fn bench_header_sniffing(c: &mut Criterion) {
    let pdf_data = create_test_pdf(1);
    let non_pdf_data = b"Not a PDF file at all, just random text content";

    c.bench_function("sniff_valid_pdf", |b| {
        b.iter(|| podcheck::sniff_header(black_box(&pdf_data)).is_ok());
    });

    c.bench_function("sniff_non_pdf", |b| {
        b.iter(|| podcheck::sniff_header(black_box(non_pdf_data)).is_err());
    });
}

/// Benchmark the analysis alone, parallel against sequential.
fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("analysis");
    let trim = Some(TrimSize::new(5.5, 8.5));

    for page_count in [24u32, 300, 700] {
        let doc = create_memory_book(page_count);
        let parallel = PreflightOptions::new().with_expected_trim(trim);
        let sequential = parallel.clone().sequential();

        group.bench_with_input(BenchmarkId::new("parallel", page_count), &doc, |b, doc| {
            b.iter(|| podcheck::run_with_options(black_box(doc), &parallel));
        });
        group.bench_with_input(BenchmarkId::new("sequential", page_count), &doc, |b, doc| {
            b.iter(|| podcheck::run_with_options(black_box(doc), &sequential));
        });
    }

    group.finish();
}

/// Benchmark loading and layout extraction through lopdf.
fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extraction");

    for page_count in [1u32, 10, 50] {
        let data = create_test_pdf(page_count);

        group.bench_function(format!("{}_pages", page_count), |b| {
            b.iter(|| {
                LopdfBackend::load_bytes(black_box(&data)).map(|backend| backend.snapshot())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_header_sniffing,
    bench_analysis,
    bench_extraction,
);
criterion_main!(benches);
