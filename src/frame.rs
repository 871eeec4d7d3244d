use crate::bbox::{self, BBox, Ltrb};
use nalgebra as na;

pub const FLIP_MARKER: &str = "_flip";

/// One observation of a single pedestrian.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub image: String,
    pub bbox: BBox<Ltrb>,
    pub center: na::Point2<f32>,
    // crossing = 1
    pub label: u8,
    // obd speed or vehicle action, depending on the dataset
    pub speed: Option<f32>,
}

impl Frame {
    /// Horizontally mirrored copy of this frame for an image `width` pixels wide.
    pub fn flipped(&self, width: f32) -> Self {
        Self {
            image: flipped_image_name(&self.image),
            bbox: self.bbox.flip_horizontal(width),
            center: bbox::flip_point(&self.center, width),
            label: self.label,
            speed: self.speed,
        }
    }
}

/// `set01/video_0001/00042.png` -> `set01/video_0001/00042_flip.png`
pub fn flipped_image_name(image: &str) -> String {
    let name_start = image.rfind('/').map_or(0, |i| i + 1);

    match image[name_start..].rfind('.') {
        Some(dot) => {
            let (stem, ext) = image.split_at(name_start + dot);
            format!("{}{}{}", stem, FLIP_MARKER, ext)
        }
        None => format!("{}{}", image, FLIP_MARKER),
    }
}

/// Strips the flip marker, returning the original image path and whether it was present.
pub fn unflipped_image_name(image: &str) -> (String, bool) {
    if image.contains(FLIP_MARKER) {
        (image.replacen(FLIP_MARKER, "", 1), true)
    } else {
        (image.to_string(), false)
    }
}
