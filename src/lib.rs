// THEORY:
// This file is the main entry point for the `region_sieve` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the public
// API that will be exposed to external consumers (like the `visual_inspector`
// front-end).
//
// The primary goal is to export the `RegionPipeline` and its associated data
// structures (`PipelineConfig`, `RegionDescriptor`, `Selection`, etc.) as the
// clean, high-level interface for the whole analysis chain. The internal
// modules (`core_modules`) stay encapsulated behind `pipeline`, providing a
// clean separation of concerns.

pub mod core_modules;
pub mod pipeline;
