//! On-disk cache of per-frame visual features.
//!
//! Entries live at `<root>/<set_id>/<video_id>/<image_name>[_<ped_id>].bin` and
//! hold the raw spatial map produced by the extractor. Lookups pool that map
//! over both spatial axes into one vector, so hits and misses return the same
//! values. There is no eviction and no locking.

use crate::bbox::{BBox, Ltrb};
use crate::crop::{CropMode, CropPolicy};
use crate::error::{Error, Result};
use crate::frame;
use crate::tensor;
use crate::window::Sample;

use image::RgbImage;
use indicatif::ProgressBar;
use ndarray::prelude::*;
use rayon::prelude::*;
use serde_derive::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const CACHE_EXT: &str = "bin";

/// Headless pretrained backbone.
pub trait FeatureExtractor: Send + Sync {
    /// Side of the square input image
    fn input_size(&self) -> u32 {
        224
    }

    /// Forward pass, returns the `(height, width, channels)` feature map.
    fn extract(&self, image: &RgbImage) -> Result<Array3<f32>>;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct CachedTensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl CachedTensor {
    fn from_array(arr: &Array3<f32>) -> Self {
        Self {
            shape: arr.shape().to_vec(),
            data: arr.iter().copied().collect(),
        }
    }

    fn into_array(self, path: &Path) -> Result<ArrayD<f32>> {
        ArrayD::from_shape_vec(IxDyn(&self.shape), self.data).map_err(|err| Error::CacheDecode {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }
}

pub struct FeatureCache<E: FeatureExtractor> {
    extractor: E,
    root: PathBuf,
    crop_mode: CropMode,
    regen: bool,
}

impl<E: FeatureExtractor> FeatureCache<E> {
    pub fn new<P: Into<PathBuf>>(extractor: E, root: P) -> Self {
        Self {
            extractor,
            root: root.into(),
            crop_mode: CropMode::default(),
            regen: false,
        }
    }

    pub fn with_crop_mode(mut self, crop_mode: CropMode) -> Self {
        self.crop_mode = crop_mode;
        self
    }

    /// Recompute and overwrite entries even if they exist.
    pub fn with_regen(mut self, regen: bool) -> Self {
        self.regen = regen;
        self
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn cache_path(&self, image: &str, ped_id: &str, policy: CropPolicy) -> PathBuf {
        let mut parts = image.rsplit(|c: char| c == '/' || c == '\\');
        let file = parts.next().unwrap_or_default();
        let vid_id = parts.next().unwrap_or_default();
        let set_id = parts.next().unwrap_or_default();

        let name = file.split('.').next().unwrap_or_default();
        let name = match policy {
            CropPolicy::None => format!("{}.{}", name, CACHE_EXT),
            CropPolicy::BBox => format!("{}_{}.{}", name, ped_id, CACHE_EXT),
        };

        self.root.join(set_id).join(vid_id).join(name)
    }

    pub fn get_feature(
        &self,
        image: &str,
        bbox: &BBox<Ltrb>,
        ped_id: &str,
        policy: CropPolicy,
    ) -> Result<Array1<f32>> {
        self.lookup(image, bbox, ped_id, policy, None)
            .map(|(feature, _)| feature)
    }

    /// Returns the feature and, on a miss, the path that was actually decoded.
    fn lookup(
        &self,
        image: &str,
        bbox: &BBox<Ltrb>,
        ped_id: &str,
        policy: CropPolicy,
        fallback: Option<&str>,
    ) -> Result<(Array1<f32>, Option<String>)> {
        let path = self.cache_path(image, ped_id, policy);

        if !self.regen && path.exists() {
            log::debug!("cache hit {:?}", path);
            return Ok((pool(read_entry(&path)?)?, None));
        }

        log::debug!("cache miss {:?}", path);

        let (img, decoded) = load_image(image, fallback)?;
        let input = self
            .crop_mode
            .apply(policy.apply(&img, bbox), self.extractor.input_size());

        let raw = self.extractor.extract(&input)?;
        write_entry(&path, &raw)?;

        Ok((pool(raw.into_dyn())?, Some(decoded)))
    }

    /// Features for every frame of every sample, `(num_samples, window_len, channels)`.
    ///
    /// `image_path` maps a frame reference to the image to decode (e.g. the
    /// segmentation variant). Samples are processed in parallel, frames of one
    /// sample in order so a corrupt frame can fall back to the previously
    /// decoded one.
    pub fn extract_sequences<F>(
        &self,
        samples: &[Sample],
        window_len: usize,
        policy: CropPolicy,
        image_path: F,
        label: &'static str,
    ) -> Result<Array3<f32>>
    where
        F: Fn(&str) -> String + Sync,
    {
        log::info!(
            "generating {} features for {} samples, crop_type = {}, crop_mode = {:?}, save_path = {:?}",
            label,
            samples.len(),
            policy.as_str(),
            self.crop_mode,
            self.root
        );

        let total = samples.len();
        let bar = ProgressBar::new(total as u64);
        bar.set_message(label);

        let sequences = samples
            .par_iter()
            .map(|sample| {
                let seq = self.extract_sample(sample, policy, &image_path);

                bar.inc(1);
                log::debug!("{}: {}/{}", label, bar.position(), total);

                seq
            })
            .collect::<Result<Vec<_>>>();

        bar.finish_and_clear();

        tensor::stack_sequences::<f32, _>(label, &sequences?, window_len)
    }

    fn extract_sample<F>(
        &self,
        sample: &Sample,
        policy: CropPolicy,
        image_path: &F,
    ) -> Result<Vec<Vec<f32>>>
    where
        F: Fn(&str) -> String,
    {
        let mut prev: Option<String> = None;
        let mut seq = Vec::with_capacity(sample.len());

        for (image, bbox) in sample.images.iter().zip(sample.boxes_org.iter()) {
            let image = image_path(image);
            let (feature, decoded) =
                self.lookup(&image, bbox, &sample.ped_id, policy, prev.as_deref())?;

            if decoded.is_some() {
                prev = decoded;
            }

            seq.push(feature.into_raw_vec());
        }

        Ok(seq)
    }
}

impl<E: FeatureExtractor + ?Sized> FeatureExtractor for &E {
    fn input_size(&self) -> u32 {
        (**self).input_size()
    }

    fn extract(&self, image: &RgbImage) -> Result<Array3<f32>> {
        (**self).extract(image)
    }
}

/// Decodes `image`, mirroring it when it names a flipped variant. A decode
/// failure is retried once with `fallback`. Returns the decoded original path.
fn load_image(image: &str, fallback: Option<&str>) -> Result<(RgbImage, String)> {
    let (source, flip) = frame::unflipped_image_name(image);

    let (img, decoded) = match decode(&source) {
        Ok(img) => (img, source),
        Err(err) => match fallback {
            Some(prev) => {
                log::warn!("{}, substituting previous frame {}", err, prev);
                (decode(prev)?, prev.to_string())
            }
            None => return Err(err),
        },
    };

    let img = if flip {
        image::imageops::flip_horizontal(&img)
    } else {
        img
    };

    Ok((img, decoded))
}

fn decode(path: &str) -> Result<RgbImage> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|source| Error::ImageDecode {
            path: PathBuf::from(path),
            source,
        })
}

/// Writes the entry next to its final location and renames it into place, so
/// concurrent readers see either no entry or a complete one.
fn write_entry(path: &Path, raw: &Array3<f32>) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    bincode::serialize_into(tmp.as_file_mut(), &CachedTensor::from_array(raw))?;
    tmp.as_file_mut().flush()?;
    tmp.persist(path).map_err(|err| err.error)?;

    Ok(())
}

/// Reads a cache entry, falling back to the JSON encoding when the binary one
/// does not decode.
fn read_entry(path: &Path) -> Result<ArrayD<f32>> {
    let bytes = std::fs::read(path)?;

    let tensor = match bincode::deserialize::<CachedTensor>(&bytes) {
        Ok(tensor) => tensor,
        Err(bin_err) => {
            serde_json::from_slice::<CachedTensor>(&bytes).map_err(|json_err| {
                Error::CacheDecode {
                    path: path.to_path_buf(),
                    reason: format!("bincode: {}; json: {}", bin_err, json_err),
                }
            })?
        }
    };

    tensor.into_array(path)
}

/// Averages over every axis but the last.
pub fn pool(mut raw: ArrayD<f32>) -> Result<Array1<f32>> {
    while raw.ndim() > 1 {
        raw = raw
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::Extractor("empty feature map".into()))?;
    }

    Ok(raw.into_dimensionality::<Ix1>()?)
}
