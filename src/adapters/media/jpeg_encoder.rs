use base64::prelude::*;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType};

use crate::{
    domain::{Photo, MAX_PHOTO_WIDTH, PHOTO_JPEG_QUALITY},
    ports::{PhotoEncoder, PhotoError},
};

/// Downscales to a maximum width (keeping aspect ratio) and re-encodes as JPEG.
pub struct JpegPhotoEncoder {
    max_width: u32,
    quality: u8,
}

impl Default for JpegPhotoEncoder {
    fn default() -> Self {
        Self {
            max_width: MAX_PHOTO_WIDTH,
            quality: PHOTO_JPEG_QUALITY,
        }
    }
}

impl PhotoEncoder for JpegPhotoEncoder {
    fn encode(&self, input: &[u8]) -> Result<Photo, PhotoError> {
        let image =
            image::load_from_memory(input).map_err(|e| PhotoError::InvalidImage(e.to_string()))?;

        let image = if image.width() > self.max_width {
            let height = (u64::from(image.height()) * u64::from(self.max_width)
                / u64::from(image.width()))
            .max(1) as u32;
            image.resize_exact(self.max_width, height, FilterType::Triangle)
        } else {
            image
        };

        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode_image(&rgb)
            .map_err(|e| PhotoError::Encode(e.to_string()))?;

        Ok(Photo {
            data_uri: format!("data:image/jpeg;base64,{}", BASE64_STANDARD.encode(&jpeg)),
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb([180, 120, 60])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn decoded_width(photo: &Photo) -> u32 {
        let b64 = photo
            .data_uri
            .strip_prefix("data:image/jpeg;base64,")
            .unwrap();
        let bytes = BASE64_STANDARD.decode(b64).unwrap();
        image::load_from_memory(&bytes).unwrap().width()
    }

    #[test]
    fn wide_photos_are_scaled_to_max_width() {
        let photo = JpegPhotoEncoder::default().encode(&png(2400, 1600)).unwrap();
        assert_eq!((photo.width, photo.height), (1200, 800));
        assert_eq!(decoded_width(&photo), 1200);
    }

    #[test]
    fn small_photos_keep_their_size() {
        let photo = JpegPhotoEncoder::default().encode(&png(640, 480)).unwrap();
        assert_eq!((photo.width, photo.height), (640, 480));
        assert!(photo.data_uri.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn garbage_is_rejected() {
        let err = JpegPhotoEncoder::default().encode(b"not an image").unwrap_err();
        assert!(matches!(err, PhotoError::InvalidImage(_)));
    }
}
