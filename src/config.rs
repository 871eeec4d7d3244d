//! Model/data options and their documented defaults.
//!
//! ```
//! use pedseq::config::{InputType, ModelOpts, ModelOptsOverride};
//!
//! let opts = ModelOpts::default().merge(ModelOptsOverride {
//!     obs_input_type: Some(vec![InputType::Box, InputType::Speed]),
//!     ..Default::default()
//! });
//!
//! assert_eq!(opts.obs_length, 15);
//! assert_eq!(opts.obs_input_type.len(), 2);
//! ```

use crate::crop::CropMode;
use crate::error::{Error, Result};

use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Feature stream fed to one model input head.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    /// Visual features of the pedestrian's bounding-box crop
    LocalBox,
    /// Visual features of an enlarged context crop (not supported)
    LocalContext,
    /// Visual features of the bounding-box crop on segmentation frames
    SegBox,
    /// Box coordinates
    Box,
    /// Box centers
    Center,
    /// Ego-vehicle speed (or vehicle action)
    Speed,
    /// Pedestrian identifiers
    PedId,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::LocalBox => "local_box",
            InputType::LocalContext => "local_context",
            InputType::SegBox => "seg_box",
            InputType::Box => "box",
            InputType::Center => "center",
            InputType::Speed => "speed",
            InputType::PedId => "ped_id",
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "local_box" => InputType::LocalBox,
            "local_context" => InputType::LocalContext,
            "seg_box" => InputType::SegBox,
            "box" => InputType::Box,
            "center" => InputType::Center,
            "speed" => InputType::Speed,
            "ped_id" => InputType::PedId,
            other => return Err(Error::UnsupportedInputType(other.to_string())),
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PredTarget {
    Crossing,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelOpts {
    /// Requested streams; the order is the model's input order
    pub obs_input_type: Vec<InputType>,
    pub enlarge_ratio: f32,
    pub pred_target_type: Vec<PredTarget>,
    pub obs_length: usize,
    /// Frames between the end of the observation window and the event
    pub time_to_event: usize,
    pub dataset: String,
    pub normalize_boxes: bool,
    /// Root of the on-disk feature cache
    pub feature_root: PathBuf,
    pub crop_mode: CropMode,
    /// Recompute features even when a cache entry exists
    pub regen_data: bool,
}

impl Default for ModelOpts {
    fn default() -> Self {
        Self {
            obs_input_type: vec![
                InputType::LocalBox,
                InputType::LocalContext,
                InputType::Box,
                InputType::Speed,
            ],
            enlarge_ratio: 1.5,
            pred_target_type: vec![PredTarget::Crossing],
            obs_length: 15,
            time_to_event: 60,
            dataset: "pie".to_string(),
            normalize_boxes: true,
            feature_root: PathBuf::from("data/features"),
            crop_mode: CropMode::PadResize,
            regen_data: false,
        }
    }
}

/// Caller-supplied options; every `Some` field replaces the default.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ModelOptsOverride {
    pub obs_input_type: Option<Vec<InputType>>,
    pub enlarge_ratio: Option<f32>,
    pub pred_target_type: Option<Vec<PredTarget>>,
    pub obs_length: Option<usize>,
    pub time_to_event: Option<usize>,
    pub dataset: Option<String>,
    pub normalize_boxes: Option<bool>,
    pub feature_root: Option<PathBuf>,
    pub crop_mode: Option<CropMode>,
    pub regen_data: Option<bool>,
}

impl ModelOpts {
    pub fn merge(self, o: ModelOptsOverride) -> Self {
        Self {
            obs_input_type: o.obs_input_type.unwrap_or(self.obs_input_type),
            enlarge_ratio: o.enlarge_ratio.unwrap_or(self.enlarge_ratio),
            pred_target_type: o.pred_target_type.unwrap_or(self.pred_target_type),
            obs_length: o.obs_length.unwrap_or(self.obs_length),
            time_to_event: o.time_to_event.unwrap_or(self.time_to_event),
            dataset: o.dataset.unwrap_or(self.dataset),
            normalize_boxes: o.normalize_boxes.unwrap_or(self.normalize_boxes),
            feature_root: o.feature_root.unwrap_or(self.feature_root),
            crop_mode: o.crop_mode.unwrap_or(self.crop_mode),
            regen_data: o.regen_data.unwrap_or(self.regen_data),
        }
    }

    /// Defaults overridden by the keys present in a JSON object.
    pub fn from_json(json: &str) -> Result<Self> {
        let o: ModelOptsOverride = serde_json::from_str(json)?;

        Ok(Self::default().merge(o))
    }

    pub fn validate(&self) -> Result<()> {
        if self.obs_input_type.is_empty() {
            return Err(Error::InvalidConfig("obs_input_type is empty".into()));
        }

        for (i, t) in self.obs_input_type.iter().enumerate() {
            if self.obs_input_type[..i].contains(t) {
                return Err(Error::InvalidConfig(format!(
                    "input type `{}` requested twice",
                    t
                )));
            }
        }

        if self.pred_target_type != [PredTarget::Crossing] {
            return Err(Error::InvalidConfig(format!(
                "only crossing prediction is supported, got {:?}",
                self.pred_target_type
            )));
        }

        if self.dataset.is_empty() {
            return Err(Error::InvalidConfig("dataset name is empty".into()));
        }

        Ok(())
    }

    /// `<feature_root>/<stream>/<dataset>`
    pub fn feature_dir(&self, stream: InputType) -> PathBuf {
        self.feature_root.join(stream.as_str()).join(&self.dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = ModelOpts::default();

        assert_eq!(
            opts.obs_input_type,
            vec![
                InputType::LocalBox,
                InputType::LocalContext,
                InputType::Box,
                InputType::Speed
            ]
        );
        assert_eq!(opts.enlarge_ratio, 1.5);
        assert_eq!(opts.pred_target_type, vec![PredTarget::Crossing]);
        assert_eq!((opts.obs_length, opts.time_to_event), (15, 60));
        assert_eq!(opts.dataset, "pie");
        assert!(opts.normalize_boxes);
    }

    #[test]
    fn json_overrides_only_given_keys() {
        let opts = ModelOpts::from_json(
            r#"{"obs_input_type": ["box", "speed"], "dataset": "jaad", "crop_mode": "warp"}"#,
        )
        .unwrap();

        assert_eq!(opts.obs_input_type, vec![InputType::Box, InputType::Speed]);
        assert_eq!(opts.dataset, "jaad");
        assert_eq!(opts.crop_mode, CropMode::Warp);
        assert_eq!(opts.obs_length, 15);
        assert!(opts.normalize_boxes);
    }

    #[test]
    fn unknown_input_type_is_rejected() {
        assert!(ModelOpts::from_json(r#"{"obs_input_type": ["pose"]}"#).is_err());
        assert!(matches!(
            "pose".parse::<InputType>(),
            Err(Error::UnsupportedInputType(_))
        ));
    }

    #[test]
    fn duplicate_input_types_fail_validation() {
        let opts = ModelOpts::default().merge(ModelOptsOverride {
            obs_input_type: Some(vec![InputType::Box, InputType::Box]),
            ..Default::default()
        });

        assert!(matches!(opts.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn feature_dir_layout() {
        let opts = ModelOpts::default();

        assert_eq!(
            opts.feature_dir(InputType::LocalBox),
            PathBuf::from("data/features/local_box/pie")
        );
    }
}
