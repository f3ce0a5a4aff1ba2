pub mod framer;
pub mod protocol;

pub use framer::{
    encode_frame, DecodeReport, FrameError, NdjsonDecoder, DEFAULT_MAX_FRAME_BYTES,
};
pub use protocol::{CommandFrame, EventFrame, WorkerAction};
