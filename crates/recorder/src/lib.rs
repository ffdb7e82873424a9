#![warn(clippy::unwrap_used)]

pub mod recorder;
pub mod writer;

pub use recorder::ImpressionRecorder;
pub use writer::BatchWriter;
