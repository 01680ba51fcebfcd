pub mod csv;
pub mod database;

pub use csv::{CsvExporter, ExportReport};
pub use database::{DatabaseSink, PersistReport};
