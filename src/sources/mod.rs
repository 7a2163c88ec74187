//! Record sources
//!
//! [`RecordSource`] is the seam between the pipeline and the remote API.
//! [`ApiSportsClient`] is the production implementation.

pub mod api_sports;
pub mod traits;

pub use api_sports::ApiSportsClient;
pub use traits::{RawRecord, RecordSource};
