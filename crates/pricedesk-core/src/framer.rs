use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use thiserror::Error;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame exceeds max size: {size} > {max}")]
    OversizedFrame { size: usize, max: usize },
    #[error("buffer exceeds max size without delimiter: {size} > {max}")]
    OversizedBuffer { size: usize, max: usize },
    #[error("frame encode failed: {0}")]
    Encode(String),
}

/// Result of feeding one chunk to the decoder. Frames are complete parsed
/// messages; diagnostics are complete lines that were not valid JSON (the
/// worker's plain log output shares the stream with its messages, so these
/// are forwarded to a logging sink rather than treated as failures).
#[derive(Debug, Clone)]
pub struct DecodeReport<T> {
    pub frames: Vec<T>,
    pub diagnostics: Vec<String>,
    pub errors: Vec<FrameError>,
}

impl<T> Default for DecodeReport<T> {
    fn default() -> Self {
        Self {
            frames: Vec::new(),
            diagnostics: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> DecodeReport<T> {
    fn push_frame(&mut self, frame: T) {
        self.frames.push(frame);
    }

    fn push_diagnostic(&mut self, line: String) {
        self.diagnostics.push(line);
    }

    fn push_error(&mut self, error: FrameError) {
        self.errors.push(error);
    }
}

pub fn encode_frame<T: Serialize>(
    value: &T,
    max_frame_bytes: usize,
) -> Result<Vec<u8>, FrameError> {
    let mut encoded =
        serde_json::to_vec(value).map_err(|err| FrameError::Encode(err.to_string()))?;
    if encoded.len() > max_frame_bytes {
        return Err(FrameError::OversizedFrame {
            size: encoded.len(),
            max: max_frame_bytes,
        });
    }
    encoded.push(b'\n');
    Ok(encoded)
}

/// Incremental newline-delimited JSON decoder. Bytes after the last newline
/// are retained and prepended to the next chunk, so a frame may arrive in as
/// many pieces as the stream chooses to deliver it.
pub struct NdjsonDecoder<T> {
    max_frame_bytes: usize,
    pending: Vec<u8>,
    marker: PhantomData<T>,
}

impl<T> NdjsonDecoder<T> {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            pending: Vec::new(),
            marker: PhantomData,
        }
    }
}

impl<T> Default for NdjsonDecoder<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl<T: DeserializeOwned> NdjsonDecoder<T> {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> DecodeReport<T> {
        let mut report = DecodeReport::default();
        if !chunk.is_empty() {
            self.pending.extend_from_slice(chunk);
        }

        while let Some(newline_idx) = self.pending.iter().position(|byte| *byte == b'\n') {
            let mut line = self.pending.drain(..=newline_idx).collect::<Vec<u8>>();
            if line.ends_with(b"\n") {
                line.pop();
            }
            if line.ends_with(b"\r") {
                line.pop();
            }
            self.decode_line(&line, &mut report);
        }

        if !self.pending.is_empty() && self.pending.len() > self.max_frame_bytes {
            report.push_error(FrameError::OversizedBuffer {
                size: self.pending.len(),
                max: self.max_frame_bytes,
            });
            self.pending.clear();
        }

        report
    }

    /// Flush a trailing unterminated line, e.g. when the stream closes.
    pub fn finish(&mut self) -> DecodeReport<T> {
        if self.pending.is_empty() {
            return DecodeReport::default();
        }

        let final_line = std::mem::take(&mut self.pending);
        let mut report = DecodeReport::default();
        self.decode_line(&final_line, &mut report);
        report
    }

    fn decode_line(&self, line: &[u8], report: &mut DecodeReport<T>) {
        if line.iter().all(|byte| byte.is_ascii_whitespace()) {
            return;
        }
        if line.len() > self.max_frame_bytes {
            report.push_error(FrameError::OversizedFrame {
                size: line.len(),
                max: self.max_frame_bytes,
            });
            return;
        }
        match serde_json::from_slice(line) {
            Ok(parsed) => report.push_frame(parsed),
            Err(_) => report.push_diagnostic(String::from_utf8_lossy(line).into_owned()),
        }
    }
}
