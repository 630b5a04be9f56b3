use crate::config::{ClassifyConfig, TensorLayout};
use crate::Result;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use ndarray::{Array3, Array4, Axis};

pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// 分类模型预处理流水线：
    /// 转 RGB -> 缩放到 size x size（不保持宽高比）-> 除以255 -> 添加batch维度
    pub fn to_tensor(image: &DynamicImage, config: &ClassifyConfig) -> Result<Array4<f32>> {
        let rgb = Self::to_rgb(image);
        let resized = Self::resize_exact(&rgb, config.input_size);
        let hwc = Self::normalize(&resized);

        let tensor = match config.layout {
            TensorLayout::Nhwc => hwc.insert_axis(Axis(0)),
            TensorLayout::Nchw => hwc
                .permuted_axes([2, 0, 1])
                .as_standard_layout()
                .into_owned()
                .insert_axis(Axis(0)),
        };

        tracing::debug!("Preprocessed tensor shape: {:?}", tensor.shape());
        Ok(tensor)
    }

    /// 转换为三通道 RGB，alpha 通道直接丢弃（不做合成）
    pub fn to_rgb(image: &DynamicImage) -> RgbImage {
        match image {
            DynamicImage::ImageRgb8(rgb) => rgb.clone(),
            other => other.to_rgb8(),
        }
    }

    /// 缩放到固定尺寸，双三次插值
    pub fn resize_exact(image: &RgbImage, size: u32) -> RgbImage {
        if image.width() == size && image.height() == size {
            return image.clone();
        }
        image::imageops::resize(image, size, size, FilterType::CatmullRom)
    }

    /// 0-255 像素值映射到 [0,1]，输出 HWC
    pub fn normalize(image: &RgbImage) -> Array3<f32> {
        let (width, height) = image.dimensions();
        Array3::from_shape_fn((height as usize, width as usize, 3), |(h, w, c)| {
            image.get_pixel(w as u32, h as u32)[c] as f32 / 255.0
        })
    }
}
