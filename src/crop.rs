use crate::bbox::{BBox, Ltrb};
use crate::error::{Error, Result};

use image::{imageops, imageops::FilterType, RgbImage};
use serde_derive::{Deserialize, Serialize};
use std::str::FromStr;

/// Which region of the frame is fed to the feature extractor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CropPolicy {
    /// Whole frame, cached without a pedestrian suffix.
    None,
    /// Frame cropped to the pedestrian's bounding box.
    BBox,
}

impl CropPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CropPolicy::None => "none",
            CropPolicy::BBox => "bbox",
        }
    }

    pub fn apply(&self, img: &RgbImage, bbox: &BBox<Ltrb>) -> RgbImage {
        match self {
            CropPolicy::None => img.clone(),
            CropPolicy::BBox => {
                let (x, y, w, h) = bbox.pixel_rect(img.width(), img.height());
                imageops::crop_imm(img, x, y, w, h).to_image()
            }
        }
    }
}

impl FromStr for CropPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(CropPolicy::None),
            "bbox" => Ok(CropPolicy::BBox),
            other => Err(Error::UnsupportedCropType(other.to_string())),
        }
    }
}

/// How a crop is brought to the square extractor input.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CropMode {
    /// Resize to `size`x`size`, ignoring the aspect ratio.
    Warp,
    /// Leave the crop untouched.
    Same,
    /// Paste onto a black canvas without resizing.
    PadSame,
    /// Scale the longer side to `size`, then pad.
    #[default]
    PadResize,
    /// Like `PadResize` only for crops larger than `size`, otherwise `PadSame`.
    PadFit,
}

impl FromStr for CropMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "warp" => Ok(CropMode::Warp),
            "same" => Ok(CropMode::Same),
            "pad_same" => Ok(CropMode::PadSame),
            "pad_resize" => Ok(CropMode::PadResize),
            "pad_fit" => Ok(CropMode::PadFit),
            other => Err(Error::UnsupportedCropMode(other.to_string())),
        }
    }
}

impl CropMode {
    pub fn apply(&self, img: RgbImage, size: u32) -> RgbImage {
        let (w, h) = img.dimensions();

        match self {
            CropMode::Warp => imageops::resize(&img, size, size, FilterType::Nearest),
            CropMode::Same => img,
            CropMode::PadSame => pad(&img, size),
            CropMode::PadResize => pad(&fit(&img, size), size),
            CropMode::PadFit => {
                if w > size || h > size {
                    pad(&fit(&img, size), size)
                } else {
                    pad(&img, size)
                }
            }
        }
    }
}

fn fit(img: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let longest = w.max(h);
    if longest == 0 {
        return img.clone();
    }

    let ratio = size as f32 / longest as f32;
    let nw = ((w as f32 * ratio) as u32).clamp(1, size);
    let nh = ((h as f32 * ratio) as u32).clamp(1, size);

    imageops::resize(img, nw, nh, FilterType::Nearest)
}

fn pad(img: &RgbImage, size: u32) -> RgbImage {
    let mut canvas = RgbImage::new(size, size);
    let (w, h) = img.dimensions();
    let x = (size as i64 - w as i64) / 2;
    let y = (size as i64 - h as i64) / 2;

    imageops::overlay(&mut canvas, img, x, y);

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn unknown_crop_type_is_a_config_error() {
        assert!(matches!(
            "context".parse::<CropPolicy>(),
            Err(Error::UnsupportedCropType(s)) if s == "context"
        ));
        assert_eq!("bbox".parse::<CropPolicy>().unwrap(), CropPolicy::BBox);
    }

    #[test]
    fn unknown_crop_mode_is_a_config_error() {
        assert!(matches!(
            "stretch".parse::<CropMode>(),
            Err(Error::UnsupportedCropMode(s)) if s == "stretch"
        ));
        assert_eq!("pad_fit".parse::<CropMode>().unwrap(), CropMode::PadFit);
    }

    #[test]
    fn bbox_crop_extracts_region() {
        let mut img = RgbImage::new(20, 10);
        img.put_pixel(5, 2, Rgb([255, 0, 0]));

        let crop = CropPolicy::BBox.apply(&img, &BBox::ltrb(5.0, 2.0, 9.0, 8.0));
        assert_eq!(crop.dimensions(), (4, 6));
        assert_eq!(crop.get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn pad_resize_keeps_aspect_and_centers() {
        let img = RgbImage::from_pixel(100, 50, Rgb([10, 10, 10]));
        let out = CropMode::PadResize.apply(img, 224);

        assert_eq!(out.dimensions(), (224, 224));
        // 224x112 content centered vertically
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(112, 112), &Rgb([10, 10, 10]));
        assert_eq!(out.get_pixel(112, 56), &Rgb([10, 10, 10]));
        assert_eq!(out.get_pixel(112, 55), &Rgb([0, 0, 0]));
    }

    #[test]
    fn pad_fit_does_not_upscale_small_crops() {
        let img = RgbImage::from_pixel(10, 10, Rgb([1, 2, 3]));
        let out = CropMode::PadFit.apply(img, 224);

        assert_eq!(out.dimensions(), (224, 224));
        assert_eq!(out.get_pixel(107, 107), &Rgb([1, 2, 3]));
        assert_eq!(out.get_pixel(106, 107), &Rgb([0, 0, 0]));
    }

    #[test]
    fn warp_ignores_aspect() {
        let img = RgbImage::new(30, 7);
        assert_eq!(CropMode::Warp.apply(img, 224).dimensions(), (224, 224));
    }
}
