use crate::Result;
use base64::Engine;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// 上传图像的预览缩略图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePreview {
    pub width: u32,
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
    /// data:image/png;base64,...
    pub data_url: String,
}

/// 图像变换工具集
pub struct ImageTransforms;

impl ImageTransforms {
    /// 计算缩略图尺寸：保持宽高比，长边不超过 max_edge，不放大
    pub fn thumbnail_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
        if width <= max_edge && height <= max_edge {
            return (width, height);
        }

        // 整数四舍五入，避免浮点误差
        let long = width.max(height) as u64;
        let scale = |side: u32| {
            let scaled = (side as u64 * max_edge as u64 + long / 2) / long;
            (scaled as u32).clamp(1, max_edge)
        };
        (scale(width), scale(height))
    }

    pub fn thumbnail(image: &DynamicImage, max_edge: u32) -> DynamicImage {
        let (w, h) = Self::thumbnail_dimensions(image.width(), image.height(), max_edge);
        if (w, h) == (image.width(), image.height()) {
            return image.clone();
        }
        image.resize_exact(w, h, FilterType::Triangle)
    }

    /// 生成预览图并编码为 PNG data URL
    pub fn preview(image: &DynamicImage, max_edge: u32) -> Result<ImagePreview> {
        let thumb = Self::thumbnail(image, max_edge);

        let mut buf = Cursor::new(Vec::new());
        thumb.write_to(&mut buf, ImageFormat::Png)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(buf.into_inner());

        Ok(ImagePreview {
            width: thumb.width(),
            height: thumb.height(),
            original_width: image.width(),
            original_height: image.height(),
            data_url: format!("data:image/png;base64,{}", encoded),
        })
    }
}
