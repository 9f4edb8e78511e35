use anyhow::{Context, Result, bail};
use image::GrayImage;
use opencv::{
    core::{self, Mat, Scalar},
    highgui, imgproc,
    prelude::*,
};
use region_sieve::pipeline::{
    DEFAULT_REPORT_PATH, DisplayTarget, FieldPolicy, PipelineConfig, RegionAnalysis,
    RegionPipeline, ReportWriter, ReviewCommand, ReviewSession, ReviewStep, average_report_file,
    format_block,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: visual_inspector review <binary_image> [report_path] [display WxH]");
        println!("       visual_inspector average [report_path] [--strict]");
        return Ok(());
    }

    match args[1].as_str() {
        "review" => {
            if args.len() < 3 {
                bail!("review needs a binary image path");
            }
            let report_path = args
                .get(3)
                .cloned()
                .unwrap_or_else(|| DEFAULT_REPORT_PATH.to_string());
            let display = match args.get(4) {
                Some(spec) => parse_display(spec)?,
                None => DisplayTarget { width: 1920, height: 1080 },
            };
            run_review(&args[2], &report_path, display)
        }
        "average" => {
            let mut report_path = DEFAULT_REPORT_PATH.to_string();
            let mut policy = FieldPolicy::ZeroFill;
            for arg in &args[2..] {
                if arg == "--strict" {
                    policy = FieldPolicy::SkipMissing;
                } else {
                    report_path = arg.clone();
                }
            }
            run_average(&report_path, policy)
        }
        other => bail!("unknown command '{}'", other),
    }
}

/// Parses a display geometry like `1920x1080`.
fn parse_display(spec: &str) -> Result<DisplayTarget> {
    let (w, h) = spec
        .split_once('x')
        .with_context(|| format!("display spec '{}' is not WIDTHxHEIGHT", spec))?;
    Ok(DisplayTarget {
        width: w.parse().context("display width")?,
        height: h.parse().context("display height")?,
    })
}

/// Interactive per-object walkthrough: shows each object's mask in a window
/// centered on the display, echoes its descriptor block to the console, and
/// appends the block to the report on demand.
///
/// Keys: 'n' next object, 'b' previous object, 's' save properties, 'q' quit.
fn run_review(image_path: &str, report_path: &str, display: DisplayTarget) -> Result<()> {
    let binary: GrayImage = image::open(image_path)
        .with_context(|| format!("opening '{}'", image_path))?
        .to_luma8();

    let pipeline = RegionPipeline::new(PipelineConfig::default());
    let analysis = pipeline.analyze(&binary);
    log::info!("'{}': {} labeled objects", image_path, analysis.descriptors.len());
    if analysis.descriptors.is_empty() {
        println!("No objects found in the image.");
        return Ok(());
    }

    let mut writer = ReportWriter::create(report_path)?;
    let mut session = ReviewSession::new(&analysis.descriptors);

    while let Some(descriptor) = session.current() {
        // Console echo in the exact report block format.
        print!("{}", format_block(descriptor));

        show_object_centered(&analysis, descriptor.label, display)?;

        // Block for one recognized key per iteration.
        let command = loop {
            let key = highgui::wait_key(0)?;
            match key {
                k if k == 'n' as i32 => break ReviewCommand::Next,
                k if k == 'b' as i32 => break ReviewCommand::Previous,
                k if k == 's' as i32 => break ReviewCommand::Save,
                k if k == 'q' as i32 => break ReviewCommand::Quit,
                _ => {}
            }
        };

        match session.apply(command) {
            ReviewStep::SaveRequested => {
                let saved = session.current().expect("save keeps the cursor");
                writer.append(saved)?;
                println!(
                    "Properties of Object {} saved to '{}'.",
                    saved.label, report_path
                );
            }
            ReviewStep::Continue => {
                highgui::destroy_all_windows()?;
            }
            ReviewStep::Finished => {
                println!("Exiting loop.");
                break;
            }
        }
    }

    highgui::destroy_all_windows()?;
    Ok(())
}

/// Renders one object's mask with its label drawn at the centroid, in a
/// window centered on the given display surface.
fn show_object_centered(
    analysis: &RegionAnalysis,
    label: u32,
    display: DisplayTarget,
) -> Result<()> {
    let descriptor = &analysis.descriptors[(label - 1) as usize];
    let mask = analysis.object_mask(label);

    let gray = gray_to_mat(&mask)?;
    let mut colored = Mat::default();
    imgproc::cvt_color(&gray, &mut colored, imgproc::COLOR_GRAY2BGR, 0)?;

    // Label text sits at the centroid; centroid is (row, col), Point is (x, y).
    imgproc::put_text(
        &mut colored,
        &label.to_string(),
        core::Point::new(descriptor.centroid.1 as i32, descriptor.centroid.0 as i32),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.6,
        Scalar::new(0.0, 0.0, 255.0, 0.0),
        2,
        imgproc::LINE_8,
        false,
    )?;

    let window = format!("Object {}", label);
    highgui::named_window(&window, highgui::WINDOW_AUTOSIZE)?;
    let (x, y) = display.centered_origin(mask.width(), mask.height());
    highgui::move_window(&window, x, y)?;
    highgui::imshow(&window, &colored)?;
    Ok(())
}

/// Copies a grayscale buffer into an 8-bit single-channel Mat.
fn gray_to_mat(image: &GrayImage) -> Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        image.height() as i32,
        image.width() as i32,
        core::CV_8UC1,
        Scalar::all(0.0),
    )?;
    for (x, y, pixel) in image.enumerate_pixels() {
        *mat.at_2d_mut::<u8>(y as i32, x as i32)? = pixel.0[0];
    }
    Ok(mat)
}

/// Batch half of the tool: averages every block of a saved report.
fn run_average(report_path: &str, policy: FieldPolicy) -> Result<()> {
    match average_report_file(report_path, policy)? {
        Some(averages) => {
            println!("Average Area: {}", averages.area);
            println!("Average Eccentricity: {}", averages.eccentricity);
            println!("Average Perimeter: {}", averages.perimeter);
            println!("Average Aspect Ratio: {}", averages.aspect_ratio);
            println!("Average Solidity: {}", averages.solidity);
            println!("Average Extent: {}", averages.extent);
        }
        None => println!("No objects found in the properties file."),
    }
    Ok(())
}
