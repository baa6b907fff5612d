//! Decoded line reading for content filtering
//!
//! [`DecodedLines`] turns any byte reader into a lazy sequence of text
//! lines. Bytes are decoded in fixed-size chunks with `encoding_rs`, so a
//! content search that matches early never reads the rest of the file.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use encoding_rs::{CoderResult, Decoder, DecoderResult, Encoding};

use super::options::ReadOptions;
use crate::errors::{FindError, FindResult};

const CHUNK_SIZE: usize = 8 * 1024;

/// What to do with bytes that are not valid in the configured encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodePolicy {
    /// Fail the read with `InvalidData`
    #[default]
    Strict,
    /// Substitute U+FFFD
    Replace,
    /// Drop the offending bytes
    Ignore,
}

impl fmt::Display for DecodePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodePolicy::Strict => f.write_str("strict"),
            DecodePolicy::Replace => f.write_str("replace"),
            DecodePolicy::Ignore => f.write_str("ignore"),
        }
    }
}

impl FromStr for DecodePolicy {
    type Err = FindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(DecodePolicy::Strict),
            "replace" => Ok(DecodePolicy::Replace),
            "ignore" => Ok(DecodePolicy::Ignore),
            _ => Err(FindError::InvalidValue {
                field: "decode error policy",
                value: s.to_string(),
                reason: "expected strict, replace or ignore".to_string(),
            }),
        }
    }
}

/// Which sequences end a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Newline {
    /// Any of `\n`, `\r\n` or `\r`
    #[default]
    Universal,
    Lf,
    Cr,
    CrLf,
}

impl fmt::Display for Newline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Newline::Universal => f.write_str("universal"),
            Newline::Lf => f.write_str("lf"),
            Newline::Cr => f.write_str("cr"),
            Newline::CrLf => f.write_str("crlf"),
        }
    }
}

impl FromStr for Newline {
    type Err = FindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "universal" | "none" | "" | "''" => Ok(Newline::Universal),
            "lf" | "\\n" => Ok(Newline::Lf),
            "cr" | "\\r" => Ok(Newline::Cr),
            "crlf" | "\\r\\n" => Ok(Newline::CrLf),
            _ => Err(FindError::InvalidValue {
                field: "newline",
                value: s.to_string(),
                reason: "expected universal, lf, cr or crlf".to_string(),
            }),
        }
    }
}

/// Resolves an encoding label such as `utf-8` or `latin1`.
///
/// Anything after `#` is a comment and ignored.
pub fn parse_encoding(label: &str) -> FindResult<&'static Encoding> {
    let label = label.split('#').next().unwrap_or_default().trim();
    if label.is_empty() {
        return Err(FindError::NothingToSearch("Content encoding"));
    }
    Encoding::for_label(label.as_bytes()).ok_or_else(|| FindError::UnknownEncoding(label.to_string()))
}

/// Opens a file for line-by-line reading.
///
/// The file handle lives inside the returned iterator and is closed when
/// the iterator is dropped.
pub fn open_lines(path: &Path, options: &ReadOptions) -> io::Result<DecodedLines<File>> {
    Ok(DecodedLines::new(File::open(path)?, options))
}

/// Lazy sequence of decoded lines with terminators stripped
pub struct DecodedLines<R> {
    reader: R,
    decoder: Decoder,
    errors: DecodePolicy,
    newline: Newline,
    buf: Box<[u8]>,
    text: String,
    pos: usize,
    eof: bool,
    done: bool,
}

impl<R: Read> DecodedLines<R> {
    pub fn new(reader: R, options: &ReadOptions) -> Self {
        Self {
            reader,
            decoder: options.encoding.new_decoder_with_bom_removal(),
            errors: options.errors,
            newline: options.newline,
            buf: vec![0u8; CHUNK_SIZE].into_boxed_slice(),
            text: String::new(),
            pos: 0,
            eof: false,
            done: false,
        }
    }

    /// Splits the next complete line off the decoded text, if any.
    fn take_line(&mut self) -> Option<String> {
        let rest = &self.text[self.pos..];
        let (start, len) = match self.newline {
            Newline::Lf => (rest.find('\n')?, 1),
            Newline::Cr => (rest.find('\r')?, 1),
            Newline::CrLf => (rest.find("\r\n")?, 2),
            Newline::Universal => {
                let i = rest.find(|c: char| c == '\n' || c == '\r')?;
                if rest.as_bytes()[i] == b'\n' {
                    (i, 1)
                } else if i + 1 < rest.len() {
                    (i, if rest.as_bytes()[i + 1] == b'\n' { 2 } else { 1 })
                } else if self.eof {
                    (i, 1)
                } else {
                    // a trailing \r may be the first half of \r\n
                    return None;
                }
            }
        };
        let line = rest[..start].to_string();
        self.pos += start + len;
        Some(line)
    }

    /// Reads and decodes the next chunk.
    fn fill(&mut self) -> io::Result<()> {
        self.text.drain(..self.pos);
        self.pos = 0;

        let n = loop {
            match self.reader.read(&mut self.buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        let last = n == 0;

        let Self {
            decoder,
            text,
            buf,
            errors,
            ..
        } = self;
        decode_into(decoder, text, *errors, &buf[..n], last)?;

        if last {
            self.eof = true;
        }
        Ok(())
    }
}

fn decode_into(
    decoder: &mut Decoder,
    text: &mut String,
    errors: DecodePolicy,
    mut input: &[u8],
    last: bool,
) -> io::Result<()> {
    let reserve = |text: &mut String, needed: Option<usize>| {
        text.reserve(needed.unwrap_or(CHUNK_SIZE * 4));
    };

    loop {
        if errors == DecodePolicy::Replace {
            reserve(text, decoder.max_utf8_buffer_length(input.len()));
            let (result, read, _) = decoder.decode_to_string(input, text, last);
            input = &input[read..];
            if result == CoderResult::InputEmpty {
                return Ok(());
            }
            continue;
        }

        reserve(text, decoder.max_utf8_buffer_length_without_replacement(input.len()));
        let (result, read) = decoder.decode_to_string_without_replacement(input, text, last);
        input = &input[read..];
        match result {
            DecoderResult::InputEmpty => return Ok(()),
            DecoderResult::OutputFull => {}
            DecoderResult::Malformed(..) if errors == DecodePolicy::Ignore => {}
            DecoderResult::Malformed(..) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("'{}' codec can't decode the file contents", decoder.encoding().name()),
                ));
            }
        }
    }
}

impl<R: Read> Iterator for DecodedLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(line) = self.take_line() {
                return Some(Ok(line));
            }
            if self.eof {
                self.done = true;
                if self.pos < self.text.len() {
                    return Some(Ok(self.text[self.pos..].to_string()));
                }
                return None;
            }
            if let Err(e) = self.fill() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}
