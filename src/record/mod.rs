//! Record shapes flowing through a harvest
//!
//! - `Page`: one list-endpoint response
//! - `RawRecord`: a detail-endpoint response, logged verbatim
//! - `NormalizedRecord`: the derived training-ready form

mod normalized;
mod page;
mod raw;
mod transform;

pub use normalized::{
    Derived, Metadata, NormalizedRecord, QaPair, QnaTask, SummarizationTask,
};
pub use page::Page;
pub use raw::RawRecord;
pub use transform::transform;
