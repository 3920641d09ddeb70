pub mod etl;
pub mod fits;
pub mod render;
pub mod resample;
pub mod timestamps;

pub use crate::domain::model::{Magnetogram, ObservationTime, RunSummary, Table};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage, Summary};
pub use crate::utils::error::Result;
