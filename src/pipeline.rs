// THEORY:
// The `pipeline` module is the top-level API for the crate. It chains the
// three stages (labeling, descriptor extraction, selection) behind a single
// configurable entry point and re-exports the data structures callers need,
// so front-ends like `visual_inspector` never reach into `core_modules`
// directly.

use crate::core_modules::labeling::{self, LabeledImage};
use crate::core_modules::{region, selection};
use anyhow::Result;
use image::GrayImage;

// Re-export key data structures for the public API.
pub use crate::core_modules::region::{BoundingBox, RegionDescriptor};
pub use crate::core_modules::report::{
    DEFAULT_REPORT_PATH, FieldPolicy, PropertyAverages, ReportWriter, average_report,
    average_report_file, format_block,
};
pub use crate::core_modules::review::{DisplayTarget, ReviewCommand, ReviewSession, ReviewStep};
pub use crate::core_modules::selection::{
    DEFAULT_AREA_TOLERANCE, DEFAULT_SHAPE_TOLERANCE, InvalidTarget, Selection, TargetProperties,
    Tolerances,
};
pub use imageproc::region_labelling::Connectivity;

/// Configuration for the analysis chain, allowing for tunable behavior.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Neighborhood used by the labeler. Four matches the original chain.
    pub connectivity: Connectivity,
    /// Absolute half-width of the area tolerance band, in pixels.
    pub area_tolerance: f64,
    /// Absolute half-width of the solidity/extent/eccentricity bands.
    pub shape_tolerance: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            connectivity: Connectivity::Four,
            area_tolerance: DEFAULT_AREA_TOLERANCE,
            shape_tolerance: DEFAULT_SHAPE_TOLERANCE,
        }
    }
}

/// Labeling plus descriptor extraction for one binary image.
pub struct RegionAnalysis {
    pub labeled: LabeledImage,
    /// One descriptor per label, ascending label order (index i = label i+1).
    pub descriptors: Vec<RegionDescriptor>,
}

impl RegionAnalysis {
    /// Binary mask of a single labeled object, for rendering.
    pub fn object_mask(&self, label: u32) -> GrayImage {
        labeling::object_mask(&self.labeled, label)
    }
}

/// The main, top-level struct for the analysis chain.
pub struct RegionPipeline {
    config: PipelineConfig,
}

impl RegionPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Stage 1 and 2: label the image and measure every region.
    pub fn analyze(&self, binary: &GrayImage) -> RegionAnalysis {
        let labeled = labeling::label_components(binary, self.config.connectivity);
        log::debug!("labeled {} regions", labeled.num_labels);
        let descriptors = region::measure_regions(&labeled);
        RegionAnalysis { labeled, descriptors }
    }

    /// Stage 3: full selection run. `properties` is the four-field target
    /// slice `[area, solidity, extent, eccentricity]`; any other length is
    /// rejected before any labeling work happens.
    pub fn select(&self, binary: &GrayImage, properties: &[f64]) -> Result<Selection> {
        let target = TargetProperties::from_slice(properties)?;
        let analysis = self.analyze(binary);
        let tolerances = Tolerances {
            area: self.config.area_tolerance,
            shape: self.config.shape_tolerance,
        };
        Ok(selection::select_matching(
            &analysis.labeled,
            &analysis.descriptors,
            &target,
            &tolerances,
        ))
    }
}

/// Convenience entry point with the stock tolerances (1200 pixels of area,
/// 0.045 of shape). Returns the filtered image and the matching bounding
/// boxes, in ascending label order.
pub fn select_objects(binary: &GrayImage, properties: &[f64]) -> Result<(GrayImage, Vec<BoundingBox>)> {
    let pipeline = RegionPipeline::new(PipelineConfig::default());
    let selection = pipeline.select(binary, properties)?;
    Ok((selection.filtered, selection.bboxes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::labeling::tests::create_binary;

    #[test]
    fn end_to_end_selection_keeps_the_matching_square() {
        // A 3x3 square (area 9) and a 2x2 square (area 4).
        let image = create_binary(&[
            &[1, 1, 1, 0, 0, 0],
            &[1, 1, 1, 0, 1, 1],
            &[1, 1, 1, 0, 1, 1],
        ]);
        let config = PipelineConfig {
            connectivity: Connectivity::Four,
            area_tolerance: 2.0,
            shape_tolerance: 0.05,
        };
        let pipeline = RegionPipeline::new(config);
        let selection = pipeline
            .select(&image, &[4.0, 1.0, 1.0, 0.0])
            .expect("valid target");

        assert_eq!(selection.labels, vec![2]);
        assert_eq!(
            selection.bboxes,
            vec![BoundingBox { min_row: 1, min_col: 4, max_row: 3, max_col: 6 }]
        );
        let lit: Vec<(u32, u32)> = selection
            .filtered
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] == 255)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(lit, vec![(4, 1), (5, 1), (4, 2), (5, 2)]);
    }

    #[test]
    fn invalid_target_fails_before_any_labeling() {
        let image = create_binary(&[&[1]]);
        let err = select_objects(&image, &[1.0, 1.0, 1.0]).unwrap_err();
        assert!(err.downcast_ref::<InvalidTarget>().is_some());
    }

    #[test]
    fn analyze_exposes_masks_for_review() {
        let image = create_binary(&[&[1, 0, 1]]);
        let pipeline = RegionPipeline::new(PipelineConfig::default());
        let analysis = pipeline.analyze(&image);
        assert_eq!(analysis.descriptors.len(), 2);
        let mask = analysis.object_mask(2);
        assert_eq!(mask.get_pixel(2, 0).0[0], 255);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
    }
}
