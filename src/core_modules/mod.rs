pub mod labeling;
pub mod region;
pub mod report;
pub mod review;
pub mod selection;
