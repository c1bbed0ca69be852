use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, RgbImage};
use ndarray::Array2;

use crate::error::Result;

/// 特征提取使用的固定尺寸 RGB 像素网格
#[derive(Debug, Clone)]
pub struct PixelGrid {
    image: RgbImage,
}

impl PixelGrid {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// 将图片缩放到指定尺寸，缩放使用双线性插值，结果是确定的
    pub fn resize(image: &DynamicImage, width: u32, height: u32) -> Self {
        let rgb = if image.dimensions() == (width, height) {
            image.to_rgb8()
        } else {
            image.resize_exact(width, height, FilterType::Triangle).to_rgb8()
        };
        Self { image: rgb }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// 像素总数
    pub fn len(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按行优先顺序遍历所有像素
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.image.pixels().map(|p| p.0)
    }

    /// 灰度图，形状为 (height, width)
    pub fn gray(&self) -> Array2<u8> {
        let gray = imageops::grayscale(&self.image);
        let shape = (self.height() as usize, self.width() as usize);
        Array2::from_shape_vec(shape, gray.into_raw()).expect("灰度图尺寸与像素网格一致")
    }
}

/// 解码图片数据，支持常见的栅格图片格式
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}

/// 解码图片并缩放到指定尺寸
pub fn decode(bytes: &[u8], width: u32, height: u32) -> Result<PixelGrid> {
    let image = decode_image(bytes)?;
    Ok(PixelGrid::resize(&image, width, height))
}
