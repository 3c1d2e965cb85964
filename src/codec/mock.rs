use super::{EncodedImage, ImageCodec, WEBP_CONTENT_TYPE, WEBP_EXTENSION};
use crate::models::EncodeOptions;
use crate::{Error, Result};
use image::DynamicImage;
use std::sync::{Arc, Mutex};

/// Records what the pipeline asked the codec to do.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeCall {
    pub width: u32,
    pub height: u32,
    pub options: EncodeOptions,
}

/// Codec stand-in that skips real pixel work.
///
/// `decode` ignores its input and yields a blank raster of the configured
/// size, so tests can push large dimensions through the pipeline cheaply.
#[derive(Clone)]
pub struct MockImageCodec {
    decoded_size: (u32, u32),
    fail_decode: Arc<Mutex<bool>>,
    fail_encode: Arc<Mutex<bool>>,
    encode_calls: Arc<Mutex<Vec<EncodeCall>>>,
}

impl MockImageCodec {
    pub fn new() -> Self {
        Self {
            decoded_size: (10, 10),
            fail_decode: Arc::new(Mutex::new(false)),
            fail_encode: Arc::new(Mutex::new(false)),
            encode_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_decoded_size(mut self, width: u32, height: u32) -> Self {
        self.decoded_size = (width, height);
        self
    }

    pub fn with_decode_failure(self, should_fail: bool) -> Self {
        *self.fail_decode.lock().unwrap() = should_fail;
        self
    }

    pub fn with_encode_failure(self, should_fail: bool) -> Self {
        *self.fail_encode.lock().unwrap() = should_fail;
        self
    }

    pub fn get_encode_calls(&self) -> Vec<EncodeCall> {
        self.encode_calls.lock().unwrap().clone()
    }
}

impl Default for MockImageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for MockImageCodec {
    fn decode(&self, _bytes: &[u8]) -> Result<DynamicImage> {
        if *self.fail_decode.lock().unwrap() {
            return Err(Error::decode("Mock decode failure"));
        }
        let (width, height) = self.decoded_size;
        Ok(DynamicImage::new_rgb8(width, height))
    }

    fn encode(&self, image: &DynamicImage, options: &EncodeOptions) -> Result<EncodedImage> {
        self.encode_calls.lock().unwrap().push(EncodeCall {
            width: image.width(),
            height: image.height(),
            options: *options,
        });

        if *self.fail_encode.lock().unwrap() {
            return Err(Error::encode("Mock encode failure"));
        }

        let mut bytes = b"RIFF\0\0\0\0WEBP".to_vec();
        bytes.extend_from_slice(format!("{}x{}", image.width(), image.height()).as_bytes());
        Ok(EncodedImage {
            bytes,
            content_type: WEBP_CONTENT_TYPE,
            extension: WEBP_EXTENSION,
        })
    }
}
