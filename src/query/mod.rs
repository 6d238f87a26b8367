// Mon Jan 19 2026 - Alex

pub mod request;
pub mod response;
pub mod selector;

pub use request::{LogicalRequest, SubRequest, Target, TimeRange};
pub use response::{
    AccumulatedResponse, Frame, FrameData, LoadingState, LogLine, PartialResponse, QueryError,
    Sample, Series,
};
