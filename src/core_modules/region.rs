// THEORY:
// The `region` module is the back half of the extraction layer. Given a
// `LabeledImage` it produces one `RegionDescriptor` per region: a "dumb" data
// container summarizing the region's shape, in ascending label order so that
// index `i` always holds label `i + 1`.
//
// Key architectural principles:
// 1.  **Single accumulation pass**: area, bounding box, and the raw image
//     moments are gathered in one raster scan. Centroid, orientation, and
//     eccentricity all fall out of the central second moments afterwards.
// 2.  **Ellipse metrics from the covariance matrix**: orientation and
//     eccentricity come from the eigen-decomposition of the per-region
//     covariance of pixel coordinates, the standard best-fit-ellipse
//     treatment for binary regions.
// 3.  **Compatibility quirks preserved**: `aspect_ratio` is literally
//     `max_col / max_row` of the bbox tuple, NOT width / height. That is what
//     the original chain computed and downstream reports depend on it, so it
//     is preserved and documented rather than silently "fixed."

use crate::core_modules::labeling::LabeledImage;
use imageproc::geometry::convex_hull;
use imageproc::point::Point;

/// Axis-aligned bounding box in (row, col) space, half-open on the max side:
/// `max_row` and `max_col` are one past the last occupied index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_row: u32,
    pub min_col: u32,
    pub max_row: u32,
    pub max_col: u32,
}

impl BoundingBox {
    /// Number of pixels covered by the box.
    pub fn area(&self) -> u64 {
        (self.max_row - self.min_row) as u64 * (self.max_col - self.min_col) as u64
    }
}

/// Shape descriptors for a single labeled region.
#[derive(Debug, Clone)]
pub struct RegionDescriptor {
    /// The region's ID in the labeled image. Positive and unique per image.
    pub label: u32,
    /// Pixel count.
    pub area: u64,
    /// Bounding box (min_row, min_col, max_row, max_col), half-open maxima.
    pub bbox: BoundingBox,
    /// Center of mass as (row, col). Always inside the bounding box.
    pub centroid: (f64, f64),
    /// Angle in radians between the row axis and the major axis of the
    /// best-fit ellipse, in (-pi/2, pi/2].
    pub orientation: f64,
    /// Elongation of the best-fit ellipse: 0 for a circle, approaching 1 for
    /// a line-like region.
    pub eccentricity: f64,
    /// 4-connected boundary (crack) length: the number of unit edges between
    /// a region pixel and anything that is not this region.
    pub perimeter: f64,
    /// Literally `max_col / max_row` of the bbox tuple. Not width / height;
    /// kept for report compatibility with the original chain.
    pub aspect_ratio: f64,
    /// Area divided by the pixel count of the region's convex hull, in (0, 1].
    pub solidity: f64,
    /// Area divided by the bounding-box area, in (0, 1].
    pub extent: f64,
}

/// Running totals for one region during the accumulation pass.
struct RegionAccumulator {
    area: u64,
    min_row: u32,
    min_col: u32,
    max_row: u32,
    max_col: u32,
    sum_r: f64,
    sum_c: f64,
    sum_rr: f64,
    sum_cc: f64,
    sum_rc: f64,
    pixels: Vec<Point<i32>>,
}

impl RegionAccumulator {
    fn new() -> Self {
        Self {
            area: 0,
            min_row: u32::MAX,
            min_col: u32::MAX,
            max_row: 0,
            max_col: 0,
            sum_r: 0.0,
            sum_c: 0.0,
            sum_rr: 0.0,
            sum_cc: 0.0,
            sum_rc: 0.0,
            pixels: Vec::new(),
        }
    }

    fn push(&mut self, row: u32, col: u32) {
        self.area += 1;
        self.min_row = self.min_row.min(row);
        self.min_col = self.min_col.min(col);
        self.max_row = self.max_row.max(row);
        self.max_col = self.max_col.max(col);
        let r = row as f64;
        let c = col as f64;
        self.sum_r += r;
        self.sum_c += c;
        self.sum_rr += r * r;
        self.sum_cc += c * c;
        self.sum_rc += r * c;
        self.pixels.push(Point::new(col as i32, row as i32));
    }
}

/// Computes one descriptor per region of a labeled image, in ascending label
/// order (index `i` holds label `i + 1`). Deterministic for a given input.
pub fn measure_regions(labeled: &LabeledImage) -> Vec<RegionDescriptor> {
    let mut accumulators: Vec<RegionAccumulator> = (0..labeled.num_labels)
        .map(|_| RegionAccumulator::new())
        .collect();

    for (x, y, pixel) in labeled.map.enumerate_pixels() {
        let label = pixel.0[0];
        if label > 0 {
            accumulators[(label - 1) as usize].push(y, x);
        }
    }

    accumulators
        .into_iter()
        .enumerate()
        .map(|(i, acc)| build_descriptor(i as u32 + 1, acc, labeled))
        .collect()
}

fn build_descriptor(label: u32, acc: RegionAccumulator, labeled: &LabeledImage) -> RegionDescriptor {
    let area = acc.area as f64;
    let centroid = (acc.sum_r / area, acc.sum_c / area);

    // Central second moments, normalized by area.
    let mu_rr = acc.sum_rr / area - centroid.0 * centroid.0;
    let mu_cc = acc.sum_cc / area - centroid.1 * centroid.1;
    let mu_rc = acc.sum_rc / area - centroid.0 * centroid.1;

    let bbox = BoundingBox {
        min_row: acc.min_row,
        min_col: acc.min_col,
        max_row: acc.max_row + 1,
        max_col: acc.max_col + 1,
    };

    let hull_pixels = convex_hull_pixel_count(&acc.pixels, &bbox);

    RegionDescriptor {
        label,
        area: acc.area,
        bbox,
        centroid,
        orientation: ellipse_orientation(mu_rr, mu_cc, mu_rc),
        eccentricity: ellipse_eccentricity(mu_rr, mu_cc, mu_rc),
        perimeter: crack_perimeter(labeled, label, &bbox),
        aspect_ratio: bbox.max_col as f64 / bbox.max_row as f64,
        solidity: acc.area as f64 / hull_pixels as f64,
        extent: acc.area as f64 / bbox.area() as f64,
    }
}

/// Angle of the major axis from the covariance matrix
/// [[mu_rr, mu_rc], [mu_rc, mu_cc]], measured from the row axis.
fn ellipse_orientation(mu_rr: f64, mu_cc: f64, mu_rc: f64) -> f64 {
    0.5 * (2.0 * mu_rc).atan2(mu_rr - mu_cc)
}

/// Eccentricity from the covariance eigenvalues: sqrt(1 - lambda2 / lambda1).
fn ellipse_eccentricity(mu_rr: f64, mu_cc: f64, mu_rc: f64) -> f64 {
    let trace = mu_rr + mu_cc;
    let discriminant = ((mu_rr - mu_cc).powi(2) + 4.0 * mu_rc * mu_rc).max(0.0);
    let lambda1 = (trace + discriminant.sqrt()) / 2.0;
    let lambda2 = (trace - discriminant.sqrt()) / 2.0;
    if lambda1 <= f64::EPSILON {
        return 0.0;
    }
    (1.0 - lambda2 / lambda1).max(0.0).sqrt().clamp(0.0, 1.0)
}

/// Counts unit edges between pixels of `label` and anything else, including
/// the image border.
fn crack_perimeter(labeled: &LabeledImage, label: u32, bbox: &BoundingBox) -> f64 {
    let map = &labeled.map;
    let (width, height) = (map.width() as i64, map.height() as i64);
    let mut edges = 0u64;
    for row in bbox.min_row..bbox.max_row {
        for col in bbox.min_col..bbox.max_col {
            if map.get_pixel(col, row).0[0] != label {
                continue;
            }
            for (dr, dc) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)] {
                let nr = row as i64 + dr;
                let nc = col as i64 + dc;
                let exposed = nr < 0
                    || nr >= height
                    || nc < 0
                    || nc >= width
                    || map.get_pixel(nc as u32, nr as u32).0[0] != label;
                if exposed {
                    edges += 1;
                }
            }
        }
    }
    edges as f64
}

/// Number of pixel centers inside or on the convex hull of the region's
/// pixel centers. Degenerate hulls (fewer than 3 vertices) fall back to the
/// region's own pixel count, so solidity stays at 1.0 for points and lines.
fn convex_hull_pixel_count(pixels: &[Point<i32>], bbox: &BoundingBox) -> u64 {
    let hull = convex_hull(pixels.to_vec());
    if hull.len() < 3 {
        return pixels.len() as u64;
    }

    let mut count = 0u64;
    for row in bbox.min_row..bbox.max_row {
        for col in bbox.min_col..bbox.max_col {
            if point_in_convex_polygon(col as i64, row as i64, &hull) {
                count += 1;
            }
        }
    }
    // The hull always contains every region pixel; guard against any edge
    // rounding by never reporting a hull smaller than the region.
    count.max(pixels.len() as u64)
}

/// Inside-or-on test for a convex polygon: the point must sit on the same
/// side of every edge (zero cross products count as on the boundary).
fn point_in_convex_polygon(x: i64, y: i64, hull: &[Point<i32>]) -> bool {
    let mut positive = false;
    let mut negative = false;
    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        let cross = (b.x as i64 - a.x as i64) * (y - a.y as i64)
            - (b.y as i64 - a.y as i64) * (x - a.x as i64);
        if cross > 0 {
            positive = true;
        } else if cross < 0 {
            negative = true;
        }
        if positive && negative {
            return false;
        }
    }
    true
}
