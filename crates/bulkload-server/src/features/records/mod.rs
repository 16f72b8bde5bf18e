pub mod queries;
pub mod routes;

pub use queries::{export_records, ExportRecordsError, ExportRecordsQuery};
pub use routes::records_routes;
