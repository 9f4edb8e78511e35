// THEORY:
// The `report` module owns the SavedReport text format: one descriptor block
// per saved object, terminated by a 40-dash separator line, appended in save
// order. It also implements the batch half of the tool, which re-reads such a
// report and averages six of the numeric fields across all blocks.
//
// The parser is deliberately lenient by default. The original chain extracted
// fields with narrow patterns (integers for Area and Perimeter, `digits.digits`
// for the rest) and silently counted unparsed fields as zero while keeping the
// block in the denominator. That skews averages downward when fields are
// missing and truncates fractional perimeters. Both quirks are preserved under
// `FieldPolicy::ZeroFill`; `FieldPolicy::SkipMissing` is the stricter opt-in
// that parses full floats and drops missing fields from the denominator.

use crate::core_modules::region::RegionDescriptor;
use anyhow::Result;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Block terminator: exactly 40 dashes on their own line.
pub const SEPARATOR: &str = "----------------------------------------";

/// Default report location, relative to the working directory.
pub const DEFAULT_REPORT_PATH: &str = "properties.txt";

/// Renders one descriptor as a report block, separator included.
/// Floats are written in `Debug` form so they always carry a decimal point.
pub fn format_block(descriptor: &RegionDescriptor) -> String {
    let bbox = &descriptor.bbox;
    let mut block = format!("Object {}:\n", descriptor.label);
    block.push_str(&format!("  Area: {}\n", descriptor.area));
    block.push_str(&format!(
        "  Bounding Box: ({}, {}, {}, {})\n",
        bbox.min_row, bbox.min_col, bbox.max_row, bbox.max_col
    ));
    block.push_str(&format!(
        "  Centroid: ({:?}, {:?})\n",
        descriptor.centroid.0, descriptor.centroid.1
    ));
    block.push_str(&format!("  Orientation: {:?}\n", descriptor.orientation));
    block.push_str(&format!("  Eccentricity: {:?}\n", descriptor.eccentricity));
    block.push_str(&format!("  Perimeter: {:?}\n", descriptor.perimeter));
    block.push_str(&format!("  Aspect Ratio: {:?}\n", descriptor.aspect_ratio));
    block.push_str(&format!("  Solidity: {:?}\n", descriptor.solidity));
    block.push_str(&format!("  Extent: {:?}\n", descriptor.extent));
    block.push_str(SEPARATOR);
    block.push('\n');
    block
}

/// Append-only writer for the saved-properties report.
///
/// There is exactly one writer per session and it runs to completion before
/// any reader, so no locking is needed. Saving the same object twice appends
/// two identical blocks; the format has no dedup.
pub struct ReportWriter {
    file: File,
}

impl ReportWriter {
    /// Starts a fresh report, truncating any previous file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self { file: File::create(path)? })
    }

    /// Continues an existing report, creating the file if absent.
    pub fn open_append(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    /// Appends one descriptor block. Each call writes through immediately.
    pub fn append(&mut self, descriptor: &RegionDescriptor) -> Result<()> {
        self.file.write_all(format_block(descriptor).as_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

/// How unparseable fields are treated during averaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPolicy {
    /// Faithful default: a missing field contributes 0 and the block still
    /// counts toward the denominator. Known to skew averages downward.
    ZeroFill,
    /// Strict mode: per-field denominators only count blocks where the field
    /// actually parsed.
    SkipMissing,
}

/// Arithmetic means of the six averaged report fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyAverages {
    pub area: f64,
    pub eccentricity: f64,
    pub perimeter: f64,
    pub aspect_ratio: f64,
    pub solidity: f64,
    pub extent: f64,
    /// Number of non-empty blocks parsed.
    pub count: usize,
}

/// One field's running sum and per-field denominator.
#[derive(Default)]
struct FieldSum {
    sum: f64,
    parsed: usize,
}

impl FieldSum {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.parsed += 1;
        }
    }

    fn mean(&self, policy: FieldPolicy, blocks: usize) -> f64 {
        let denominator = match policy {
            FieldPolicy::ZeroFill => blocks,
            FieldPolicy::SkipMissing => self.parsed,
        };
        if denominator == 0 {
            0.0
        } else {
            self.sum / denominator as f64
        }
    }
}

/// Averages every block of a report. Returns `None` when the text holds no
/// non-empty blocks, which is an informational outcome rather than an error.
pub fn average_report(text: &str, policy: FieldPolicy) -> Option<PropertyAverages> {
    let mut count = 0usize;
    let mut area = FieldSum::default();
    let mut eccentricity = FieldSum::default();
    let mut perimeter = FieldSum::default();
    let mut aspect_ratio = FieldSum::default();
    let mut solidity = FieldSum::default();
    let mut extent = FieldSum::default();

    for block in text.split(SEPARATOR) {
        if block.trim().is_empty() {
            continue;
        }
        count += 1;
        area.add(parse_field(block, "Area:", NumberForm::Integer, policy));
        eccentricity.add(parse_field(block, "Eccentricity:", NumberForm::Decimal, policy));
        perimeter.add(parse_field(block, "Perimeter:", NumberForm::Integer, policy));
        aspect_ratio.add(parse_field(block, "Aspect Ratio:", NumberForm::Decimal, policy));
        solidity.add(parse_field(block, "Solidity:", NumberForm::Decimal, policy));
        extent.add(parse_field(block, "Extent:", NumberForm::Decimal, policy));
    }

    if count == 0 {
        log::info!("no objects found in the properties report");
        return None;
    }

    Some(PropertyAverages {
        area: area.mean(policy, count),
        eccentricity: eccentricity.mean(policy, count),
        perimeter: perimeter.mean(policy, count),
        aspect_ratio: aspect_ratio.mean(policy, count),
        solidity: solidity.mean(policy, count),
        extent: extent.mean(policy, count),
        count,
    })
}

/// Reads and averages a report file.
pub fn average_report_file(path: impl AsRef<Path>, policy: FieldPolicy) -> Result<Option<PropertyAverages>> {
    let text = std::fs::read_to_string(path)?;
    Ok(average_report(&text, policy))
}

/// The narrow numeric shapes the lenient parser accepts.
#[derive(Clone, Copy)]
enum NumberForm {
    /// Leading decimal digits only; a fractional tail is silently truncated.
    Integer,
    /// `digits.digits` exactly; anything else fails to parse.
    Decimal,
}

fn parse_field(block: &str, name: &str, form: NumberForm, policy: FieldPolicy) -> Option<f64> {
    let value = block
        .lines()
        .find_map(|line| line.trim_start().strip_prefix(name))?
        .trim();
    match policy {
        FieldPolicy::ZeroFill => match form {
            NumberForm::Integer => leading_integer(value),
            NumberForm::Decimal => leading_decimal(value),
        },
        FieldPolicy::SkipMissing => value.parse::<f64>().ok(),
    }
}

fn leading_integer(s: &str) -> Option<f64> {
    let digits: &str = {
        let end = s.bytes().take_while(|b| b.is_ascii_digit()).count();
        &s[..end]
    };
    if digits.is_empty() { None } else { digits.parse().ok() }
}

fn leading_decimal(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let whole = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if whole == 0 || bytes.get(whole) != Some(&b'.') {
        return None;
    }
    let fraction = bytes[whole + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
    if fraction == 0 {
        return None;
    }
    s[..whole + 1 + fraction].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::region::BoundingBox;

    fn sample_descriptor() -> RegionDescriptor {
        RegionDescriptor {
            label: 3,
            area: 25,
            bbox: BoundingBox { min_row: 2, min_col: 3, max_row: 7, max_col: 8 },
            centroid: (4.0, 5.2),
            orientation: 0.5,
            eccentricity: 0.25,
            perimeter: 20.0,
            aspect_ratio: 1.6,
            solidity: 1.0,
            extent: 1.0,
        }
    }

    #[test]
    fn block_format_is_exact() {
        let block = format_block(&sample_descriptor());
        let expected = "Object 3:\n\
                        \x20 Area: 25\n\
                        \x20 Bounding Box: (2, 3, 7, 8)\n\
                        \x20 Centroid: (4.0, 5.2)\n\
                        \x20 Orientation: 0.5\n\
                        \x20 Eccentricity: 0.25\n\
                        \x20 Perimeter: 20.0\n\
                        \x20 Aspect Ratio: 1.6\n\
                        \x20 Solidity: 1.0\n\
                        \x20 Extent: 1.0\n\
                        ----------------------------------------\n";
        assert_eq!(block, expected);
        assert_eq!(SEPARATOR.len(), 40);
    }

    fn two_block_report() -> String {
        "Object 1:\n  Area: 100\n  Eccentricity: 0.1\n  Perimeter: 0.1\n  Aspect Ratio: 0.1\n  Solidity: 0.1\n  Extent: 0.1\n".to_string()
            + SEPARATOR
            + "\nObject 2:\n  Area: 200\n  Eccentricity: 0.2\n  Perimeter: 0.2\n  Aspect Ratio: 0.2\n  Solidity: 0.2\n  Extent: 0.2\n"
            + SEPARATOR
            + "\n"
    }

    #[test]
    fn averages_two_blocks() {
        let averages = average_report(&two_block_report(), FieldPolicy::SkipMissing).unwrap();
        assert_eq!(averages.count, 2);
        assert!((averages.area - 150.0).abs() < 1e-12);
        assert!((averages.eccentricity - 0.15).abs() < 1e-12);
        assert!((averages.perimeter - 0.15).abs() < 1e-12);
        assert!((averages.aspect_ratio - 0.15).abs() < 1e-12);
        assert!((averages.solidity - 0.15).abs() < 1e-12);
        assert!((averages.extent - 0.15).abs() < 1e-12);
    }

    #[test]
    fn empty_report_averages_to_none() {
        assert!(average_report("", FieldPolicy::ZeroFill).is_none());
        // Separators with only whitespace between them hold no blocks either.
        let text = format!("{SEPARATOR}\n\n{SEPARATOR}\n");
        assert!(average_report(&text, FieldPolicy::ZeroFill).is_none());
    }

    #[test]
    fn zero_fill_keeps_missing_fields_in_denominator() {
        // Second block lost its Solidity line.
        let text = format!(
            "Object 1:\n  Area: 100\n  Solidity: 0.8\n{SEPARATOR}\nObject 2:\n  Area: 300\n{SEPARATOR}\n"
        );
        let lenient = average_report(&text, FieldPolicy::ZeroFill).unwrap();
        assert_eq!(lenient.count, 2);
        assert!((lenient.area - 200.0).abs() < 1e-12);
        assert!((lenient.solidity - 0.4).abs() < 1e-12);

        let strict = average_report(&text, FieldPolicy::SkipMissing).unwrap();
        assert!((strict.solidity - 0.8).abs() < 1e-12);
        assert!((strict.area - 200.0).abs() < 1e-12);
    }

    #[test]
    fn lenient_perimeter_is_truncated_to_integer_digits() {
        let text = format!("Object 1:\n  Perimeter: 12.75\n{SEPARATOR}\n");
        let lenient = average_report(&text, FieldPolicy::ZeroFill).unwrap();
        assert!((lenient.perimeter - 12.0).abs() < 1e-12);
        let strict = average_report(&text, FieldPolicy::SkipMissing).unwrap();
        assert!((strict.perimeter - 12.75).abs() < 1e-12);
    }

    #[test]
    fn lenient_decimal_fields_require_a_decimal_point() {
        // `Extent: 1` does not match the digits.digits form, so it zero-fills.
        let text = format!("Object 1:\n  Extent: 1\n  Solidity: 0.5\n{SEPARATOR}\n");
        let lenient = average_report(&text, FieldPolicy::ZeroFill).unwrap();
        assert_eq!(lenient.extent, 0.0);
        assert!((lenient.solidity - 0.5).abs() < 1e-12);
        // Strict mode parses plain integers as floats.
        let strict = average_report(&text, FieldPolicy::SkipMissing).unwrap();
        assert!((strict.extent - 1.0).abs() < 1e-12);
    }

    #[test]
    fn written_blocks_round_trip_through_the_parser() {
        let text = format_block(&sample_descriptor()).repeat(2);
        let averages = average_report(&text, FieldPolicy::ZeroFill).unwrap();
        assert_eq!(averages.count, 2);
        assert!((averages.area - 25.0).abs() < 1e-12);
        assert!((averages.eccentricity - 0.25).abs() < 1e-12);
        assert!((averages.solidity - 1.0).abs() < 1e-12);
    }

    #[test]
    fn writer_appends_duplicate_blocks() {
        let path = std::env::temp_dir().join(format!(
            "region_sieve_report_test_{}.txt",
            std::process::id()
        ));
        {
            let mut writer = ReportWriter::create(&path).unwrap();
            writer.append(&sample_descriptor()).unwrap();
            writer.append(&sample_descriptor()).unwrap();
        }
        {
            let mut writer = ReportWriter::open_append(&path).unwrap();
            writer.append(&sample_descriptor()).unwrap();
        }
        let averages = average_report_file(&path, FieldPolicy::ZeroFill)
            .unwrap()
            .unwrap();
        assert_eq!(averages.count, 3);
        std::fs::remove_file(&path).ok();
    }
}
