// Service exports
pub mod matching_client;
pub mod workbook;

pub use matching_client::{ClientError, MatchingService, RemoteMatchingClient, ACCEPTED_EXTENSIONS};
pub use workbook::{queue_workbook_bytes, write_queue_workbook, WorkbookError};
