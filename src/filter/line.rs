use bytes::BytesMut;

use super::{Decoded, PipelineFilter};
use crate::error::CodecError;

const TERMINATOR: &[u8] = b"\r\n";
const DEFAULT_MAX_LINE: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPackage {
    pub text: String,
}

/// Splits `\r\n` terminated text lines. The terminator is not part of the
/// decoded text.
pub struct LineFilter {
    max_line: usize,
    searched: usize,
}

impl LineFilter {
    pub fn new(max_line: usize) -> Self {
        LineFilter {
            max_line,
            searched: 0,
        }
    }
}

impl Default for LineFilter {
    fn default() -> Self {
        LineFilter::new(DEFAULT_MAX_LINE)
    }
}

impl PipelineFilter for LineFilter {
    type Package = TextPackage;

    fn filter(&mut self, buf: &mut BytesMut) -> Result<Option<Decoded<TextPackage>>, CodecError> {
        // resume one byte early in case the last chunk ended between \r and \n
        let from = self.searched.saturating_sub(1).min(buf.len());
        let Some(pos) = buf[from..]
            .windows(TERMINATOR.len())
            .position(|w| w == TERMINATOR)
            .map(|pos| pos + from)
        else {
            // a full-length line may still be waiting for the \n after its \r
            if buf.len() > self.max_line + TERMINATOR.len() - 1 {
                return Err(CodecError::LineTooLong(self.max_line));
            }
            self.searched = buf.len();
            return Ok(None);
        };
        if pos > self.max_line {
            return Err(CodecError::LineTooLong(self.max_line));
        }

        let line = buf.split_to(pos + TERMINATOR.len());
        self.searched = 0;
        Ok(Some(Decoded::new(TextPackage {
            text: String::from_utf8_lossy(&line[..pos]).into_owned(),
        })))
    }
}
