use anyhow::Result;
use image::DynamicImage;
use image::imageops::FilterType;

mod backbone;
mod head;
mod model;

pub use backbone::{CommandBackbone, PooledBackbone};
pub use head::{HeadMismatchPolicy, HeadStatus, HeadWeights, LinearHead};
pub use model::{PositionModel, classify_folder, discover_classes, load_position_model};

pub const INPUT_SIZE: u32 = 224;

#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f32>,
}

impl ImageTensor {
    pub fn from_image(image: &DynamicImage) -> Self {
        let resized = image
            .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
            .to_rgb8();
        let (width, height) = (resized.width() as usize, resized.height() as usize);
        let plane = width * height;
        let mut data = vec![0.0f32; 3 * plane];
        for (x, y, pixel) in resized.enumerate_pixels() {
            let offset = y as usize * width + x as usize;
            for channel in 0..3 {
                data[channel * plane + offset] = pixel.0[channel] as f32 / 255.0;
            }
        }
        Self {
            channels: 3,
            height,
            width,
            data,
        }
    }

    pub fn at(&self, channel: usize, y: usize, x: usize) -> f32 {
        self.data[channel * self.height * self.width + y * self.width + x]
    }

    pub fn to_rgb_image(&self) -> image::RgbImage {
        image::RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let mut pixel = [0u8; 3];
            for (channel, value) in pixel.iter_mut().enumerate() {
                let unit = self.at(channel, y as usize, x as usize).clamp(0.0, 1.0);
                *value = (unit * 255.0).round() as u8;
            }
            image::Rgb(pixel)
        })
    }
}

pub trait Backbone {
    fn feature_dim(&self) -> Option<usize>;
    fn features(&self, tensor: &ImageTensor) -> Result<Vec<f32>>;
}

#[derive(Debug, Clone)]
pub enum BackboneImpl {
    Pooled(PooledBackbone),
    Command(CommandBackbone),
}

impl Backbone for BackboneImpl {
    fn feature_dim(&self) -> Option<usize> {
        match self {
            BackboneImpl::Pooled(backbone) => backbone.feature_dim(),
            BackboneImpl::Command(backbone) => backbone.feature_dim(),
        }
    }

    fn features(&self, tensor: &ImageTensor) -> Result<Vec<f32>> {
        match self {
            BackboneImpl::Pooled(backbone) => backbone.features(tensor),
            BackboneImpl::Command(backbone) => backbone.features(tensor),
        }
    }
}
