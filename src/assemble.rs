//! Turns raw dataset splits into the ordered multi-input bundle a model consumes.

use crate::balance::{self, BalanceReport};
use crate::config::{InputType, ModelOpts};
use crate::crop::CropPolicy;
use crate::dataset::{Dataset, RawSplit, SpeedSource};
use crate::error::{Error, Result};
use crate::feature_cache::{FeatureCache, FeatureExtractor};
use crate::tensor::{self, FeatureTensor};
use crate::window::{self, WindowedBatch};

use ndarray::prelude::*;
use std::collections::BTreeMap;

/// Split that is windowed as is; every other split is balanced first.
pub const TEST_SPLIT: &str = "test";

#[derive(Debug, Clone)]
pub struct SplitTensors {
    /// One tensor per requested input type, in request order
    pub inputs: Vec<FeatureTensor>,
    /// `(num_samples, 1)`
    pub labels: Array2<f32>,
    pub balance: Option<BalanceReport>,
}

#[derive(Debug, Clone)]
pub struct Assembled {
    pub splits: BTreeMap<String, SplitTensors>,
    pub input_types: Vec<InputType>,
    /// Per-type tensor shape without the sample axis, parallel to `input_types`
    pub shapes: Vec<Vec<usize>>,
}

pub struct Assembler<E: FeatureExtractor> {
    opts: ModelOpts,
    extractor: E,
}

impl<E: FeatureExtractor> Assembler<E> {
    pub fn new(opts: ModelOpts, extractor: E) -> Result<Self> {
        opts.validate()?;

        if let Some(t) = opts
            .obs_input_type
            .iter()
            .find(|t| **t == InputType::LocalContext)
        {
            return Err(Error::UnsupportedInputType(format!(
                "{} (context crops are not implemented)",
                t
            )));
        }

        Ok(Self { opts, extractor })
    }

    #[inline]
    pub fn opts(&self) -> &ModelOpts {
        &self.opts
    }

    /// Windowed (and for training splits balanced) samples of one split.
    pub fn prepare_split(
        &self,
        name: &str,
        raw: &RawSplit,
    ) -> Result<(WindowedBatch, Option<BalanceReport>, SpeedSource)> {
        let split = raw.to_split(name)?;
        let width = split.image_width();
        let speed_source = split.speed_source;

        let (tracks, report) = if name == TEST_SPLIT {
            log::info!("generating raw data for {}", name);
            (split.tracks, None)
        } else {
            log::info!("generating balanced raw data for {}", name);
            let (tracks, report) = balance::balance(split.tracks, width);
            (tracks, Some(report))
        };

        let batch = window::window(
            &tracks,
            self.opts.obs_length,
            self.opts.time_to_event,
            self.opts.normalize_boxes,
        )?;

        Ok((batch, report, speed_source))
    }

    pub fn assemble(&self, dataset: &Dataset) -> Result<Assembled> {
        let types = self.opts.obs_input_type.clone();
        let mut shapes: Vec<Option<Vec<usize>>> = vec![None; types.len()];
        let mut splits = BTreeMap::new();

        for (name, raw) in dataset {
            let (batch, report, speed_source) = self.prepare_split(name, raw)?;

            let mut inputs = Vec::with_capacity(types.len());
            for (i, ty) in types.iter().enumerate() {
                let tensor = self.build_stream(*ty, &batch, speed_source)?;

                if shapes[i].is_none() || !tensor.is_empty() {
                    shapes[i] = Some(tensor.shape()[1..].to_vec());
                }

                inputs.push(tensor);
            }

            let labels = Array2::from_shape_vec(
                (batch.len(), 1),
                batch.labels().map(f32::from).collect(),
            )?;

            splits.insert(
                name.clone(),
                SplitTensors {
                    inputs,
                    labels,
                    balance: report,
                },
            );
        }

        Ok(Assembled {
            splits,
            input_types: types,
            shapes: shapes.into_iter().map(Option::unwrap_or_default).collect(),
        })
    }

    fn build_stream(
        &self,
        ty: InputType,
        batch: &WindowedBatch,
        speed_source: SpeedSource,
    ) -> Result<FeatureTensor> {
        let len = batch.window_len;

        Ok(match ty {
            InputType::LocalBox => FeatureTensor::Dense(self.cache(ty).extract_sequences(
                &batch.samples,
                len,
                CropPolicy::BBox,
                |p| p.to_string(),
                "local_box",
            )?),

            InputType::SegBox => FeatureTensor::Dense(self.cache(ty).extract_sequences(
                &batch.samples,
                len,
                CropPolicy::BBox,
                |p| p.replace("images", "seg_images"),
                "seg_box",
            )?),

            InputType::Box => {
                let boxes: Vec<_> = batch.iter().map(|s| s.boxes.clone()).collect();
                FeatureTensor::Dense(tensor::stack_sequences::<f32, _>("box", &boxes, len)?)
            }

            InputType::Center => {
                let centers: Vec<_> = batch.iter().map(|s| s.centers.clone()).collect();
                FeatureTensor::Dense(tensor::stack_sequences::<f32, _>("center", &centers, len)?)
            }

            InputType::Speed => {
                if speed_source == SpeedSource::Unavailable {
                    return Err(Error::MissingField("speed"));
                }

                let speed = batch
                    .iter()
                    .map(|s| {
                        s.speed
                            .as_ref()
                            .map(|v| v.iter().map(|x| [*x]).collect::<Vec<_>>())
                            .ok_or(Error::MissingField("speed"))
                    })
                    .collect::<Result<Vec<_>>>()?;

                FeatureTensor::Dense(tensor::stack_sequences::<f32, _>("speed", &speed, len)?)
            }

            InputType::PedId => {
                let ids: Vec<_> = batch
                    .iter()
                    .map(|s| vec![[s.ped_id.clone()]; s.len()])
                    .collect();

                FeatureTensor::Ids(tensor::stack_sequences::<String, _>("ped_id", &ids, len)?)
            }

            InputType::LocalContext => {
                return Err(Error::UnsupportedInputType(ty.to_string()));
            }
        })
    }

    fn cache(&self, ty: InputType) -> FeatureCache<&E> {
        FeatureCache::new(&self.extractor, self.opts.feature_dir(ty))
            .with_crop_mode(self.opts.crop_mode)
            .with_regen(self.opts.regen_data)
    }
}

/// Builds train/test tensors for every split of `dataset`.
pub fn assemble<E: FeatureExtractor>(
    dataset: &Dataset,
    opts: ModelOpts,
    extractor: E,
) -> Result<Assembled> {
    Assembler::new(opts, extractor)?.assemble(dataset)
}
