//! Image decoding and web-format encoding
//!
//! The pipeline talks to a codec through [`ImageCodec`]. Implementations are
//! immutable after construction and shared across concurrent uploads.

pub mod mock;
pub mod webp;

pub use self::webp::WebpCodec;
pub use mock::MockImageCodec;

use crate::models::EncodeOptions;
use crate::{Error, Result};
use image::DynamicImage;
use std::fmt;
use std::str::FromStr;

pub const WEBP_CONTENT_TYPE: &str = "image/webp";
pub const WEBP_EXTENSION: &str = "webp";

/// Encoded output of a codec, tagged with its wire format.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub extension: &'static str,
}

pub trait ImageCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage>;
    fn encode(&self, image: &DynamicImage, options: &EncodeOptions) -> Result<EncodedImage>;
}

/// Which WebP encoder implementation backs [`WebpCodec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebpBackend {
    /// libwebp through the `webp` crate. Lossy and lossless.
    Libwebp,
    /// The `image` crate's own encoder. Lossless only.
    PureRust,
}

impl WebpBackend {
    pub fn supports_quality(&self) -> bool {
        matches!(self, WebpBackend::Libwebp)
    }
}

impl FromStr for WebpBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "libwebp" => Ok(WebpBackend::Libwebp),
            "pure-rust" | "pure_rust" | "image" => Ok(WebpBackend::PureRust),
            other => Err(format!("unknown encoder '{}'", other)),
        }
    }
}

impl fmt::Display for WebpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebpBackend::Libwebp => f.write_str("libwebp"),
            WebpBackend::PureRust => f.write_str("pure-rust"),
        }
    }
}

/// What to do when a lossy quality is requested from an encoder that has
/// no quality control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityFallback {
    /// Encode with the encoder's default settings.
    EncoderDefault,
    /// Fail the call with an encode error.
    Reject,
}

impl FromStr for QualityFallback {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "encoder-default" | "default" => Ok(QualityFallback::EncoderDefault),
            "reject" => Ok(QualityFallback::Reject),
            other => Err(format!("unknown quality fallback '{}'", other)),
        }
    }
}

/// Quality must be a real number in `[0.0, 1.0]` whether or not the encoder
/// ends up using it.
pub(crate) fn check_quality(options: &EncodeOptions) -> Result<()> {
    if options.lossless || (0.0..=1.0).contains(&options.quality) {
        Ok(())
    } else {
        Err(Error::Encode {
            message: format!("quality {} outside [0.0, 1.0]", options.quality),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("libwebp".parse::<WebpBackend>().unwrap(), WebpBackend::Libwebp);
        assert!(WebpBackend::Libwebp.supports_quality());
        assert!(!WebpBackend::PureRust.supports_quality());
        assert_eq!(
            "Pure-Rust".parse::<WebpBackend>().unwrap(),
            WebpBackend::PureRust
        );
        assert!("avif".parse::<WebpBackend>().is_err());
        assert_eq!(WebpBackend::PureRust.to_string(), "pure-rust");
    }

    #[test]
    fn test_fallback_parsing() {
        assert_eq!(
            "encoder-default".parse::<QualityFallback>().unwrap(),
            QualityFallback::EncoderDefault
        );
        assert_eq!(
            "REJECT".parse::<QualityFallback>().unwrap(),
            QualityFallback::Reject
        );
        assert!("maybe".parse::<QualityFallback>().is_err());
    }

    #[test]
    fn test_quality_range_check() {
        assert!(check_quality(&EncodeOptions::lossy(0.0)).is_ok());
        assert!(check_quality(&EncodeOptions::lossy(1.0)).is_ok());
        assert!(check_quality(&EncodeOptions::lossy(1.01)).is_err());
        assert!(check_quality(&EncodeOptions::lossy(f32::NAN)).is_err());
        assert!(check_quality(&EncodeOptions::lossy(-0.1)).is_err());
    }
}
