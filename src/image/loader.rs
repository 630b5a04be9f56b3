use crate::utils::error::ClassifierError;
use crate::Result;
use base64::Engine;
use image::{DynamicImage, ImageFormat};

/// 上传图像大小上限 (50MB)
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

pub struct ImageLoader;

impl ImageLoader {
    /// 从base64字符串加载图像
    pub fn from_base64(base64_data: &str) -> Result<DynamicImage> {
        // 检测并移除可能的数据URL前缀 (data:image/xxx;base64,)
        let base64_clean = if base64_data.starts_with("data:") {
            base64_data.split(',').nth(1).unwrap_or(base64_data)
        } else {
            base64_data
        };

        let image_bytes = base64::engine::general_purpose::STANDARD.decode(base64_clean.trim())?;

        Self::from_bytes(&image_bytes)
    }

    /// 从字节加载图像，只接受 jpg/png
    pub fn from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ClassifierError::FileTooLarge(bytes.len(), MAX_IMAGE_BYTES));
        }

        // 按内容嗅探格式，不信任上传时声明的类型
        if let Some(format) = Self::detect_format(bytes) {
            if !Self::is_supported_format(format) {
                return Err(ClassifierError::UnsupportedFormat(format!(
                    "{:?} (supported: jpg, jpeg, png)",
                    format
                )));
            }
        }

        let image = image::load_from_memory(bytes)?;

        tracing::debug!(
            "Decoded image: {}x{} {:?}",
            image.width(),
            image.height(),
            image.color()
        );

        Ok(image)
    }

    /// 检测图像格式
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(format, ImageFormat::Png | ImageFormat::Jpeg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn sample() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 10, Rgb([10, 20, 30])))
    }

    #[test]
    fn loads_png_and_jpeg() {
        let png = ImageLoader::from_bytes(&encode(&sample(), ImageFormat::Png)).unwrap();
        assert_eq!((png.width(), png.height()), (20, 10));

        let jpg = ImageLoader::from_bytes(&encode(&sample(), ImageFormat::Jpeg)).unwrap();
        assert_eq!((jpg.width(), jpg.height()), (20, 10));
    }

    #[test]
    fn rejects_other_sniffed_formats() {
        let bmp = encode(&sample(), ImageFormat::Bmp);
        let err = ImageLoader::from_bytes(&bmp).unwrap_err();
        assert!(matches!(err, ClassifierError::UnsupportedFormat(_)));
    }

    #[test]
    fn corrupt_bytes_surface_decoder_error() {
        let err = ImageLoader::from_bytes(b"\x89PNG\r\n\x1a\ngarbage").unwrap_err();
        assert!(matches!(err, ClassifierError::ImageDecode(_)));
    }

    #[test]
    fn accepts_data_url_prefix() {
        let png = encode(&sample(), ImageFormat::Png);
        let b64 = base64::engine::general_purpose::STANDARD.encode(png);
        let image = ImageLoader::from_base64(&format!("data:image/png;base64,{}", b64)).unwrap();
        assert_eq!(image.width(), 20);
    }
}
