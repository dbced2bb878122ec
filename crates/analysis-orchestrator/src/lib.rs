//! Batch orchestration: configuration, CSV datasets, the staged pipeline and
//! the text report.

pub mod config;
pub mod dataset;
pub mod pipeline;
pub mod report;


pub use config::PipelineConfig;
pub use dataset::{load_table, read_csv, sample_table, save_table, write_csv, MissingInputPolicy};
pub use pipeline::{AnalysisPipeline, PipelineOutcome, RunSummary};
pub use report::render_report;
