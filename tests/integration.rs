use image::{GrayImage, Luma};
use uinscan::{Align, BoxExtractOptions, BoxExtractor, CropRegion, Sides, UinReaderBuilder};

// Synthetic coversheet geometry: a 40px-cell identifier grid drawn at
// (160, 140) on an 800x700 page, black borders and structural rules, light
// gray cell rules, solid marks. The crop window leaves a 60px margin
// around the box on every side.
const CROP: CropRegion = CropRegion {
    x: 100,
    y: 80,
    width: 520,
    height: 550,
};
const BOX_X: u32 = 160;
const BOX_Y: u32 = 140;
const CELL: u32 = 40;

const BLACK: u8 = 0;
const GRAY: u8 = 180;

fn hline(image: &mut GrayImage, y: u32, x0: u32, x1: u32, thickness: u32, value: u8) {
    let half = thickness / 2;
    for row in y - half..=y + half {
        for x in x0..=x1 {
            image.put_pixel(x, row, Luma([value]));
        }
    }
}

fn vline(image: &mut GrayImage, x: u32, y0: u32, y1: u32, thickness: u32, value: u8) {
    let half = thickness / 2;
    for col in x - half..=x + half {
        for y in y0..=y1 {
            image.put_pixel(col, y, Luma([value]));
        }
    }
}

fn fill(image: &mut GrayImage, x: u32, y: u32, width: u32, height: u32, value: u8) {
    for row in y..y + height {
        for col in x..x + width {
            image.put_pixel(col, row, Luma([value]));
        }
    }
}

/// White page with the identifier box drawn the way the coversheet prints
/// it: heavy box border, heavy label/margin rules (header line, label
/// column divider, footer rule, right margin divider), light cell grid,
/// and one solid mark per digit column.
fn coversheet_page(digits: &[usize]) -> GrayImage {
    let mut page = GrayImage::from_pixel(800, 700, Luma([255]));
    let (x, y) = (BOX_X, BOX_Y);
    let (w, h) = (10 * CELL, 10 * CELL + 30);

    // Box border.
    hline(&mut page, y, x - 2, x + w + 2, 5, BLACK);
    hline(&mut page, y + h, x - 2, x + w + 2, 5, BLACK);
    vline(&mut page, x, y - 2, y + h + 2, 5, BLACK);
    vline(&mut page, x + w, y - 2, y + h + 2, 5, BLACK);
    // Heavy structural rules: header strip, footer strip, label column,
    // right margin.
    hline(&mut page, y + 10, x, x + w, 5, BLACK);
    hline(&mut page, y + h - 20, x, x + w, 5, BLACK);
    vline(&mut page, x + 20, y, y + h, 5, BLACK);
    vline(&mut page, x + w - 20, y, y + h, 5, BLACK);
    // Light cell grid.
    for k in 1..=9 {
        hline(&mut page, y + 10 + k * CELL, x, x + w, 3, GRAY);
    }
    for k in 1..=8 {
        vline(&mut page, x + 20 + k * CELL, y, y + h, 3, GRAY);
    }
    // Marks, centered in their cells.
    for (column, &digit) in digits.iter().enumerate() {
        let cx = x + CELL + CELL * column as u32;
        let cy = y + 30 + CELL * digit as u32;
        fill(&mut page, cx - 15, cy - 15, 30, 30, BLACK);
    }
    page
}

fn crop(page: &GrayImage) -> GrayImage {
    image::imageops::crop_imm(page, CROP.x, CROP.y, CROP.width, CROP.height).to_image()
}

fn vertical_extractor() -> BoxExtractor {
    BoxExtractor::new(BoxExtractOptions {
        align: Align::Vertical,
        ..Default::default()
    })
}

#[test]
fn reads_the_identifier_off_a_page() {
    let _ = env_logger::builder().is_test(true).try_init();

    let digits = [3, 1, 4, 1, 5, 9, 2, 6, 5];
    let page = coversheet_page(&digits);
    let reader = UinReaderBuilder::new().crop_region(CROP).build().unwrap();

    let reading = reader.read(&page).expect("Failed to read the identifier");
    assert_eq!(reading.text, "314159265");
    assert_eq!(reading.columns.len(), 9);
    assert!(reading.worst_ratio() >= 2.0, "worst_ratio {}", reading.worst_ratio());
    assert!(reading.lightest() >= 0.10, "lightest {}", reading.lightest());
}

#[test]
fn box_extraction_recovers_the_drawn_box() {
    let _ = env_logger::builder().is_test(true).try_init();

    let page = coversheet_page(&[0; 9]);
    let extracted = vertical_extractor().extract(&crop(&page)).unwrap();
    // Drawn box is 400x430; a few pixels of slack for line thickness.
    let (width, height) = extracted.dimensions();
    assert!((width as i64 - 400).abs() <= 5, "width {width}");
    assert!((height as i64 - 430).abs() <= 5, "height {height}");
}

#[test]
fn box_extraction_survives_a_skewed_scan() {
    let _ = env_logger::builder().is_test(true).try_init();

    let page = coversheet_page(&[0; 9]);
    let skewed = imageproc::geometric_transformations::rotate_about_center(
        &crop(&page),
        0.03,
        imageproc::geometric_transformations::Interpolation::Bilinear,
        Luma([255]),
    );
    let extracted = vertical_extractor().extract(&skewed).unwrap();
    let (width, height) = extracted.dimensions();
    assert!((width as i64 - 400).abs() <= 10, "width {width}");
    assert!((height as i64 - 430).abs() <= 10, "height {height}");
}

#[test]
fn unrequested_sides_keep_the_image_extent() {
    let _ = env_logger::builder().is_test(true).try_init();

    let page = coversheet_page(&[0; 9]);
    let extractor = BoxExtractor::new(BoxExtractOptions {
        align: Align::Vertical,
        sides: Sides {
            north: true,
            west: true,
            south: false,
            east: false,
        },
        ..Default::default()
    });
    let bounds = extractor.locate(&crop(&page)).unwrap();
    assert!((bounds.north as i64 - 60).abs() <= 4, "north {}", bounds.north);
    assert!((bounds.west as i64 - 60).abs() <= 4, "west {}", bounds.west);
    assert_eq!(bounds.south, CROP.height);
    assert_eq!(bounds.east, CROP.width);
}

#[test]
fn extraction_is_bit_identical_across_calls() {
    let page = coversheet_page(&[7, 7, 7, 0, 1, 2, 3, 4, 5]);
    let cropped = crop(&page);
    let extractor = vertical_extractor();
    let first = extractor.extract(&cropped).unwrap();
    let second = extractor.extract(&cropped).unwrap();
    assert_eq!(first.as_raw(), second.as_raw());
}
