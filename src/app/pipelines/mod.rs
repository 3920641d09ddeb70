pub mod harp_merge;
pub mod image_scrape;
pub mod sharp_fetch;

pub use harp_merge::HarpMergePipeline;
pub use image_scrape::ImageScrapePipeline;
pub use sharp_fetch::SharpFetchPipeline;
