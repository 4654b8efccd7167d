//! YOLO label file generation
//!
//! One line per box: `<class> <cx> <cy> <w> <h>` with spatial values
//! normalized by the image's pixel dimensions and printed with 6 fractional
//! digits. The label schema has a single defect class, so every box maps to
//! [`DEFECT_CLASS_INDEX`] regardless of its `label` text.
//!
//! Values are not clamped: a box reaching past the image edge produces
//! coordinates below 0 or above 1.

use crate::annotation::BoundingBox;

/// Class index written for every box
pub const DEFECT_CLASS_INDEX: u32 = 0;

/// Format a normalized coordinate with 6 fractional digits
///
/// Exact ties round half away from zero and negative zero prints as
/// `0.000000`. Rust's `{:.6}` rounds ties to even, so ties are handled
/// separately: an f64 sits exactly halfway between two 6-digit decimals
/// only when it is an odd multiple of 1/128.
pub fn format_normalized(value: f64) -> String {
    if value == 0.0 {
        return "0.000000".to_string();
    }

    let eighths = value * 128.0;
    let is_tie = eighths.fract() == 0.0 && eighths.abs() < 1.0e15 && eighths % 2.0 != 0.0;
    if !is_tie {
        return format!("{:.6}", value);
    }

    // k/128 * 10^6 = k * 7812.5, exact in f64 for this range
    let micros = (value.abs() * 1_000_000.0).round() as u64;
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{:06}", sign, micros / 1_000_000, micros % 1_000_000)
}

/// Normalized center-x, center-y, width, height of a box
pub fn normalize_box(b: &BoundingBox, image_width: f64, image_height: f64) -> (f64, f64, f64, f64) {
    let cx = (b.x + b.w / 2.0) / image_width;
    let cy = (b.y + b.h / 2.0) / image_height;
    let nw = b.w / image_width;
    let nh = b.h / image_height;
    (cx, cy, nw, nh)
}

/// One YOLO label line for a box
pub fn yolo_line(b: &BoundingBox, image_width: f64, image_height: f64) -> String {
    let (cx, cy, nw, nh) = normalize_box(b, image_width, image_height);
    format!(
        "{} {} {} {} {}",
        DEFECT_CLASS_INDEX,
        format_normalized(cx),
        format_normalized(cy),
        format_normalized(nw),
        format_normalized(nh)
    )
}

/// Full label file: lines joined by `\n`, no trailing newline, empty for no boxes
pub fn label_file_contents(boxes: &[BoundingBox], image_width: f64, image_height: f64) -> String {
    boxes
        .iter()
        .map(|b| yolo_line(b, image_width, image_height))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Filename with its final extension removed
///
/// `a.jpg` → `a`, `scan.v2.png` → `scan.v2`, `noext` → `noext`.
pub fn strip_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(pos) if pos + 1 < filename.len() && !filename[pos + 1..].contains('/') => {
            &filename[..pos]
        }
        _ => filename,
    }
}

/// Label object name for an image filename (`a.jpg` → `a.txt`)
pub fn label_file_name(filename: &str) -> String {
    format!("{}.txt", strip_extension(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_box() {
        let b = BoundingBox::new(100.0, 75.0, 200.0, 150.0);
        assert_eq!(
            yolo_line(&b, 400.0, 300.0),
            "0 0.500000 0.500000 0.500000 0.500000"
        );
    }

    #[test]
    fn test_top_left_quarter() {
        let b = BoundingBox::new(0.0, 0.0, 50.0, 50.0);
        assert_eq!(
            yolo_line(&b, 100.0, 100.0),
            "0 0.250000 0.250000 0.500000 0.500000"
        );
    }

    #[test]
    fn test_label_text_does_not_change_class() {
        let b = BoundingBox::new(0.0, 0.0, 50.0, 50.0).with_label("scratch");
        assert!(yolo_line(&b, 100.0, 100.0).starts_with("0 "));
    }

    #[test]
    fn test_out_of_bounds_not_clamped() {
        let b = BoundingBox::new(80.0, -10.0, 40.0, 20.0);
        assert_eq!(
            yolo_line(&b, 100.0, 100.0),
            "0 1.000000 0.000000 0.400000 0.200000"
        );

        let b = BoundingBox::new(90.0, -30.0, 40.0, 20.0);
        assert_eq!(
            yolo_line(&b, 100.0, 100.0),
            "0 1.100000 -0.200000 0.400000 0.200000"
        );
    }

    #[test]
    fn test_tie_rounds_away_from_zero() {
        // 1/128 = 0.0078125
        assert_eq!(format_normalized(1.0 / 128.0), "0.007813");
        assert_eq!(format_normalized(-1.0 / 128.0), "-0.007813");
        // 3/128 = 0.0234375
        assert_eq!(format_normalized(3.0 / 128.0), "0.023438");
        assert_eq!(format_normalized(1.0 + 5.0 / 128.0), "1.039063");
    }

    #[test]
    fn test_non_tie_rounding() {
        assert_eq!(format_normalized(1.0 / 3.0), "0.333333");
        assert_eq!(format_normalized(2.0 / 3.0), "0.666667");
        assert_eq!(format_normalized(0.5), "0.500000");
        assert_eq!(format_normalized(1.0 / 64.0), "0.015625");
    }

    #[test]
    fn test_negative_zero() {
        assert_eq!(format_normalized(-0.0), "0.000000");
    }

    #[test]
    fn test_label_file_contents() {
        let boxes = vec![
            BoundingBox::new(0.0, 0.0, 50.0, 50.0),
            BoundingBox::new(50.0, 50.0, 50.0, 50.0),
        ];
        assert_eq!(
            label_file_contents(&boxes, 100.0, 100.0),
            "0 0.250000 0.250000 0.500000 0.500000\n0 0.750000 0.750000 0.500000 0.500000"
        );
        assert_eq!(label_file_contents(&[], 100.0, 100.0), "");
    }

    #[test]
    fn test_label_file_name() {
        assert_eq!(label_file_name("a.jpg"), "a.txt");
        assert_eq!(label_file_name("scan.v2.png"), "scan.v2.txt");
        assert_eq!(label_file_name("noext"), "noext.txt");
        assert_eq!(label_file_name("trailing."), "trailing..txt");
    }
}
