// THEORY:
// The `selection` module is the decision core of the crate. Given the
// descriptors of every labeled region, a four-field target vector, and a pair
// of tolerances, it classifies each region as matching or not and rebuilds a
// binary mask containing only the matching regions.
//
// Key architectural principles:
// 1.  **Open tolerance bands**: every field test is a strictly exclusive
//     interval. A descriptor sitting exactly at target +- tolerance is
//     rejected. This mirrors the original predicate and is covered by a
//     dedicated boundary test.
// 2.  **Order independence**: the four tests are ANDed; matching labels are
//     collected in ascending label order, which is stable because the
//     extraction layer emits descriptors in label order.
// 3.  **Pixel-exact reconstruction**: the filtered image starts as all-zero
//     and gets 255 written at exactly the pixels whose label matched. No
//     smoothing, no anti-aliasing, never a pixel the input did not have.
// 4.  **Eager validation**: a malformed target slice is rejected with a
//     structured error before any labeling work happens. The caller decides
//     whether that aborts the run; the library never exits the process.

use crate::core_modules::labeling::LabeledImage;
use crate::core_modules::region::{BoundingBox, RegionDescriptor};
use anyhow::Result;
use image::GrayImage;
use std::fmt;

/// Default absolute tolerance for the area test, in pixels.
pub const DEFAULT_AREA_TOLERANCE: f64 = 1200.0;
/// Default absolute tolerance shared by the solidity, extent, and
/// eccentricity tests.
pub const DEFAULT_SHAPE_TOLERANCE: f64 = 0.045;

/// The target descriptor vector: exactly four fields, in this order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetProperties {
    pub area: f64,
    pub solidity: f64,
    pub extent: f64,
    pub eccentricity: f64,
}

/// Error raised when the caller hands over a target slice that is not
/// exactly four fields long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTarget {
    pub len: usize,
}

impl fmt::Display for InvalidTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid target properties: expected 4 fields (area, solidity, extent, eccentricity), got {}",
            self.len
        )
    }
}

impl std::error::Error for InvalidTarget {}

impl TargetProperties {
    /// Builds a target from a `[area, solidity, extent, eccentricity]` slice.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        if values.len() != 4 {
            return Err(InvalidTarget { len: values.len() }.into());
        }
        Ok(Self {
            area: values[0],
            solidity: values[1],
            extent: values[2],
            eccentricity: values[3],
        })
    }
}

/// Absolute tolerances around the target values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    /// Half-width of the area band, in pixels.
    pub area: f64,
    /// Half-width of the solidity, extent, and eccentricity bands.
    pub shape: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            area: DEFAULT_AREA_TOLERANCE,
            shape: DEFAULT_SHAPE_TOLERANCE,
        }
    }
}

/// The outcome of a selection run.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Same dimensions as the input: 255 where the pixel's label matched,
    /// 0 everywhere else. All-zero when nothing matched.
    pub filtered: GrayImage,
    /// Bounding boxes of the matching regions, ascending label order.
    pub bboxes: Vec<BoundingBox>,
    /// The matching labels, ascending.
    pub labels: Vec<u32>,
}

/// Strictly exclusive band membership: (target - tol, target + tol).
fn within_open_band(value: f64, target: f64, tolerance: f64) -> bool {
    value > target - tolerance && value < target + tolerance
}

/// The selection predicate: all four bands must hold.
pub fn matches_target(
    descriptor: &RegionDescriptor,
    target: &TargetProperties,
    tolerances: &Tolerances,
) -> bool {
    within_open_band(descriptor.area as f64, target.area, tolerances.area)
        && within_open_band(descriptor.solidity, target.solidity, tolerances.shape)
        && within_open_band(descriptor.extent, target.extent, tolerances.shape)
        && within_open_band(descriptor.eccentricity, target.eccentricity, tolerances.shape)
}

/// Filters measured regions against the target and rebuilds the binary mask
/// of the survivors. Zero matches is a valid outcome: an all-zero mask and
/// empty vectors, not an error.
pub fn select_matching(
    labeled: &LabeledImage,
    descriptors: &[RegionDescriptor],
    target: &TargetProperties,
    tolerances: &Tolerances,
) -> Selection {
    let mut labels = Vec::new();
    let mut bboxes = Vec::new();
    // Descriptor order is label order, so the collected labels stay ascending.
    let mut matched = vec![false; descriptors.len() + 1];
    for descriptor in descriptors {
        if matches_target(descriptor, target, tolerances) {
            labels.push(descriptor.label);
            bboxes.push(descriptor.bbox);
            matched[descriptor.label as usize] = true;
        }
    }

    let mut filtered = GrayImage::new(labeled.map.width(), labeled.map.height());
    for (src, dst) in labeled.map.pixels().zip(filtered.pixels_mut()) {
        let label = src.0[0] as usize;
        if label > 0 && matched[label] {
            dst.0[0] = 255;
        }
    }

    if labels.is_empty() {
        log::info!("no regions matched the target properties");
    }

    Selection {
        filtered,
        bboxes,
        labels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::labeling::{label_components, tests::create_binary};
    use crate::core_modules::region::measure_regions;
    use imageproc::region_labelling::Connectivity;

    fn descriptor(area: u64, solidity: f64, extent: f64, eccentricity: f64) -> RegionDescriptor {
        RegionDescriptor {
            label: 1,
            area,
            bbox: BoundingBox { min_row: 0, min_col: 0, max_row: 1, max_col: 1 },
            centroid: (0.0, 0.0),
            orientation: 0.0,
            eccentricity,
            perimeter: 0.0,
            aspect_ratio: 1.0,
            solidity,
            extent,
        }
    }

    fn scenario_target() -> TargetProperties {
        TargetProperties {
            area: 500.0,
            solidity: 0.9,
            extent: 0.6,
            eccentricity: 0.3,
        }
    }

    fn scenario_tolerances() -> Tolerances {
        Tolerances { area: 50.0, shape: 0.05 }
    }

    #[test]
    fn target_from_slice_requires_four_fields() {
        let err = TargetProperties::from_slice(&[500.0, 0.9, 0.6]).unwrap_err();
        assert_eq!(err.downcast_ref::<InvalidTarget>(), Some(&InvalidTarget { len: 3 }));
        assert!(TargetProperties::from_slice(&[500.0, 0.9, 0.6, 0.3]).is_ok());
    }

    #[test]
    fn all_fields_in_band_match() {
        let d = descriptor(520, 0.92, 0.62, 0.28);
        assert!(matches_target(&d, &scenario_target(), &scenario_tolerances()));
    }

    #[test]
    fn area_outside_band_rejects_regardless_of_shape() {
        let d = descriptor(560, 0.9, 0.6, 0.3);
        assert!(!matches_target(&d, &scenario_target(), &scenario_tolerances()));
    }

    #[test]
    fn band_edges_are_exclusive() {
        // Exactly representable targets and tolerances, so target +- tolerance
        // is the precise float the descriptor sits on.
        let target = TargetProperties { area: 500.0, solidity: 0.5, extent: 0.5, eccentricity: 0.5 };
        let tolerances = Tolerances { area: 50.0, shape: 0.25 };
        assert!(matches_target(&descriptor(500, 0.5, 0.5, 0.5), &target, &tolerances));
        // Exactly at target +- tolerance is rejected, field by field.
        assert!(!matches_target(&descriptor(550, 0.5, 0.5, 0.5), &target, &tolerances));
        assert!(!matches_target(&descriptor(450, 0.5, 0.5, 0.5), &target, &tolerances));
        assert!(!matches_target(&descriptor(500, 0.75, 0.5, 0.5), &target, &tolerances));
        assert!(!matches_target(&descriptor(500, 0.5, 0.25, 0.5), &target, &tolerances));
        assert!(!matches_target(&descriptor(500, 0.5, 0.5, 0.75), &target, &tolerances));
        // Just inside still matches.
        assert!(matches_target(&descriptor(549, 0.5, 0.5, 0.5), &target, &tolerances));
    }

    #[test]
    fn reconstruction_keeps_only_matching_pixels() {
        // One 2x2 square (area 4) and one 3x3 square (area 9).
        let image = create_binary(&[
            &[1, 1, 0, 1, 1, 1],
            &[1, 1, 0, 1, 1, 1],
            &[0, 0, 0, 1, 1, 1],
        ]);
        let labeled = label_components(&image, Connectivity::Four);
        let descriptors = measure_regions(&labeled);
        let target = TargetProperties { area: 9.0, solidity: 1.0, extent: 1.0, eccentricity: 0.0 };
        let tolerances = Tolerances { area: 2.0, shape: 0.05 };

        let selection = select_matching(&labeled, &descriptors, &target, &tolerances);
        assert_eq!(selection.labels, vec![2]);
        assert_eq!(selection.bboxes.len(), 1);
        assert_eq!(selection.bboxes[0].min_col, 3);

        for (x, y, pixel) in selection.filtered.enumerate_pixels() {
            let expected = if x >= 3 { 255 } else { 0 };
            assert_eq!(pixel.0[0], expected, "pixel at ({}, {})", x, y);
            // Never introduces pixels absent from the input.
            if pixel.0[0] == 255 {
                assert_ne!(image.get_pixel(x, y).0[0], 0);
            }
        }
    }

    #[test]
    fn zero_matches_is_empty_not_error() {
        let image = create_binary(&[&[1, 1], &[1, 1]]);
        let labeled = label_components(&image, Connectivity::Four);
        let descriptors = measure_regions(&labeled);
        let target = TargetProperties { area: 9999.0, solidity: 0.5, extent: 0.5, eccentricity: 0.9 };

        let selection = select_matching(&labeled, &descriptors, &target, &Tolerances::default());
        assert!(selection.labels.is_empty());
        assert!(selection.bboxes.is_empty());
        assert!(selection.filtered.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn selection_is_deterministic() {
        let image = create_binary(&[
            &[1, 1, 0, 1],
            &[1, 1, 0, 1],
            &[0, 0, 0, 1],
        ]);
        let labeled = label_components(&image, Connectivity::Four);
        let descriptors = measure_regions(&labeled);
        let target = TargetProperties { area: 4.0, solidity: 1.0, extent: 1.0, eccentricity: 0.0 };
        let tolerances = Tolerances { area: 1.0, shape: 0.01 };

        let first = select_matching(&labeled, &descriptors, &target, &tolerances);
        let second = select_matching(&labeled, &descriptors, &target, &tolerances);
        assert_eq!(first.labels, second.labels);
        assert_eq!(first.bboxes, second.bboxes);
        assert_eq!(first.filtered.as_raw(), second.filtered.as_raw());
    }
}
