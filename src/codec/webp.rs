use super::{
    check_quality, EncodedImage, ImageCodec, QualityFallback, WebpBackend, WEBP_CONTENT_TYPE,
    WEBP_EXTENSION,
};
use crate::models::EncodeOptions;
use crate::{Error, Result};
use image::codecs::webp::WebPEncoder;
use image::DynamicImage;

/// libwebp's own default effort for lossless output.
const LOSSLESS_EFFORT: f32 = 75.0;

/// Decodes any format the `image` crate recognizes and encodes WebP.
#[derive(Debug, Clone)]
pub struct WebpCodec {
    backend: WebpBackend,
    fallback: QualityFallback,
}

impl WebpCodec {
    pub fn new(backend: WebpBackend, fallback: QualityFallback) -> Self {
        Self { backend, fallback }
    }

    fn encode_libwebp(image: &DynamicImage, lossless: bool, quality: f32) -> Result<Vec<u8>> {
        let rgba = image.to_rgba8();
        let encoder = ::webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
        let quality = if lossless {
            LOSSLESS_EFFORT
        } else {
            quality * 100.0
        };

        let memory = encoder
            .encode_simple(lossless, quality)
            .map_err(|e| Error::encode(format!("libwebp rejected the image: {:?}", e)))?;
        Ok(memory.to_vec())
    }

    fn encode_pure_rust(image: &DynamicImage) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let encoder = WebPEncoder::new_lossless(&mut bytes);

        // The pure encoder only takes 8-bit layouts.
        let result = match image {
            DynamicImage::ImageRgb8(_)
            | DynamicImage::ImageRgba8(_)
            | DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_) => image.write_with_encoder(encoder),
            other => DynamicImage::ImageRgba8(other.to_rgba8()).write_with_encoder(encoder),
        };
        result.map_err(Error::encode)?;

        Ok(bytes)
    }
}

impl ImageCodec for WebpCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes).map_err(Error::decode)
    }

    fn encode(&self, image: &DynamicImage, options: &EncodeOptions) -> Result<EncodedImage> {
        check_quality(options)?;

        let bytes = if self.backend.supports_quality() {
            Self::encode_libwebp(image, options.lossless, options.quality)?
        } else if options.lossless {
            Self::encode_pure_rust(image)?
        } else {
            match self.fallback {
                QualityFallback::EncoderDefault => {
                    tracing::debug!(
                        "Encoder {} has no quality control, ignoring quality {}",
                        self.backend,
                        options.quality
                    );
                    Self::encode_pure_rust(image)?
                }
                QualityFallback::Reject => {
                    return Err(Error::Encode {
                        message: format!(
                            "encoder {} cannot encode lossy at quality {}",
                            self.backend, options.quality
                        ),
                    })
                }
            }
        };

        Ok(EncodedImage {
            bytes,
            content_type: WEBP_CONTENT_TYPE,
            extension: WEBP_EXTENSION,
        })
    }
}
