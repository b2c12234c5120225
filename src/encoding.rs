use std::fmt;

use anyhow::{Result, anyhow};
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMethod {
    Forced,
    ByteOrderMark,
    ValidUtf8,
    Guessed,
}

impl fmt::Display for DecodeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DecodeMethod::Forced => "--encoding",
            DecodeMethod::ByteOrderMark => "byte order mark",
            DecodeMethod::ValidUtf8 => "valid UTF-8",
            DecodeMethod::Guessed => "content guess",
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Detection {
    pub encoding: &'static Encoding,
    pub method: DecodeMethod,
}

#[derive(Debug, Clone)]
pub struct DecodedSource {
    pub text: String,
    pub had_errors: bool,
    pub detection: Detection,
}

impl DecodedSource {
    pub fn describe(&self) -> String {
        let mut line = format!(
            "read as {} ({})",
            self.detection.encoding.name(),
            self.detection.method
        );
        if self.had_errors {
            line.push_str(", some bytes were replaced with U+FFFD");
        }
        line
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceDecoder {
    forced: Option<&'static Encoding>,
}

impl SourceDecoder {
    pub fn new(forced_label: Option<&str>) -> Result<Self> {
        let forced = forced_label
            .map(str::trim)
            .map(|label| {
                Encoding::for_label(label.as_bytes())
                    .ok_or_else(|| anyhow!("unknown source encoding '{label}'"))
            })
            .transpose()?;
        Ok(Self { forced })
    }

    pub fn detect(&self, bytes: &[u8]) -> Detection {
        if let Some(encoding) = self.forced {
            return Detection {
                encoding,
                method: DecodeMethod::Forced,
            };
        }
        sniff(bytes)
    }

    pub fn decode(&self, bytes: &[u8]) -> DecodedSource {
        let detection = self.detect(bytes);
        // `decode` strips a leading BOM, so header names never start with U+FEFF.
        let (text, _, had_errors) = detection.encoding.decode(bytes);
        DecodedSource {
            text: text.into_owned(),
            had_errors,
            detection,
        }
    }
}

fn sniff(bytes: &[u8]) -> Detection {
    let (encoding, method) = match Encoding::for_bom(bytes) {
        Some((encoding, _)) => (encoding, DecodeMethod::ByteOrderMark),
        None if std::str::from_utf8(bytes).is_ok() => (UTF_8, DecodeMethod::ValidUtf8),
        None => {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            (detector.guess(None, true), DecodeMethod::Guessed)
        }
    };
    Detection { encoding, method }
}
