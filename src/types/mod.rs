//! Public types for the filesearch API.

mod search;
mod store;
mod upload;

pub use search::{SearchAnswer, SearchParams, SearchResult, Source};
pub use store::StoreInfo;
pub use upload::{
    BatchUploadReport, FileReport, FileStatus, IncomingFile, RejectedFile, StagedFile, UploadAck,
    UploadReceipt,
};
