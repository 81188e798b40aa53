//! Audio I/O: file frame sources and hardware playback sinks

pub mod format;
pub mod output;
pub mod sink;
pub mod source;

pub use format::{Endianness, PcmFormat, SampleType, StreamFormat};
pub use output::{CpalBackend, CpalSink};
pub use sink::{AudioBackend, HardwareSink};
pub use source::{FrameSource, SymphoniaFrameSource};
