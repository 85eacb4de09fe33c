pub mod config;
pub mod entity;
pub mod error;
pub mod memory;
pub mod report;
pub mod store;

pub use config::Config;
pub use entity::*;
pub use error::*;
pub use memory::{MemoryEntityStore, MemoryReportStore, TreeFixture};
pub use report::*;
pub use store::{EntityStore, ReportStore};
