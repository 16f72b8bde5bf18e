pub mod export;

pub use export::{
    export_records, ExportRecordsError, ExportRecordsQuery, ExportRecordsResponse,
    DEFAULT_EXPORT_FILENAME, EXPORT_HEADER,
};
