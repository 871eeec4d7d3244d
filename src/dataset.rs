//! Column-oriented sequences as handed over by the PIE/JAAD dataset interfaces,
//! and their conversion into owned [`Track`]s.

use crate::bbox::BBox;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::track::Track;

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Raw splits keyed by name (`train`, `val`, `test`), iterated in sorted order.
pub type Dataset = BTreeMap<String, RawSplit>;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RawSplit {
    pub image: Vec<Vec<String>>,
    pub pid: Vec<Vec<Vec<String>>>,
    pub bbox: Vec<Vec<[f32; 4]>>,
    pub center: Vec<Vec<[f32; 2]>>,
    pub activities: Vec<Vec<Vec<u8>>>,
    /// (width, height)
    pub image_dimension: (u32, u32),
    #[serde(default)]
    pub obd_speed: Option<Vec<Vec<Vec<f32>>>>,
    #[serde(default)]
    pub vehicle_act: Option<Vec<Vec<Vec<f32>>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedSource {
    ObdSpeed,
    VehicleAct,
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct Split {
    pub name: String,
    pub tracks: Vec<Track>,
    pub image_dimension: (u32, u32),
    pub speed_source: SpeedSource,
}

impl Split {
    #[inline]
    pub fn image_width(&self) -> f32 {
        self.image_dimension.0 as f32
    }
}

pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let file = std::fs::File::open(path)?;

    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

impl RawSplit {
    pub fn num_tracks(&self) -> usize {
        self.image.len()
    }

    /// Validates that every column agrees on the number of tracks and frames
    /// and converts the columns into one owned [`Track`] per pedestrian.
    pub fn to_split(&self, name: &str) -> Result<Split> {
        let n = self.num_tracks();

        check_tracks("pid", n, self.pid.len())?;
        check_tracks("bbox", n, self.bbox.len())?;
        check_tracks("center", n, self.center.len())?;
        check_tracks("activities", n, self.activities.len())?;

        let (speed, speed_source) = match (&self.obd_speed, &self.vehicle_act) {
            (Some(speed), _) => (Some(speed), SpeedSource::ObdSpeed),
            (None, Some(act)) => {
                log::warn!(
                    "{}: dataset does not have speed information, vehicle actions are used instead",
                    name
                );
                (Some(act), SpeedSource::VehicleAct)
            }
            (None, None) => (None, SpeedSource::Unavailable),
        };

        if let Some(speed) = speed {
            check_tracks("speed", n, speed.len())?;
        }

        let mut tracks = Vec::with_capacity(n);

        for i in 0..n {
            let len = self.image[i].len();

            check_frames("pid", i, len, self.pid[i].len())?;
            check_frames("bbox", i, len, self.bbox[i].len())?;
            check_frames("center", i, len, self.center[i].len())?;
            check_frames("activities", i, len, self.activities[i].len())?;

            if let Some(speed) = speed {
                check_frames("speed", i, len, speed[i].len())?;
            }

            let ped_id = self.pid[i]
                .first()
                .and_then(|p| p.first())
                .cloned()
                .unwrap_or_default();

            let mut frames = Vec::with_capacity(len);
            for t in 0..len {
                let label = *self.activities[i][t]
                    .first()
                    .ok_or(Error::MissingField("activities"))?;

                if label > 1 {
                    return Err(Error::InvalidConfig(format!(
                        "{}: track {} frame {} has activity {}, crossing labels must be 0 or 1",
                        name, i, t, label
                    )));
                }

                let frame_speed = match speed {
                    Some(speed) => Some(
                        *speed[i][t]
                            .first()
                            .ok_or(Error::MissingField("speed"))?,
                    ),
                    None => None,
                };

                let [cx, cy] = self.center[i][t];

                frames.push(Frame {
                    image: self.image[i][t].clone(),
                    bbox: BBox::assigned(&self.bbox[i][t]),
                    center: na::Point2::new(cx, cy),
                    label,
                    speed: frame_speed,
                });
            }

            tracks.push(Track::new(ped_id, frames));
        }

        Ok(Split {
            name: name.to_string(),
            tracks,
            image_dimension: self.image_dimension,
            speed_source,
        })
    }
}

fn check_tracks(field: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::LengthMismatch {
            field,
            index: 0,
            expected,
            actual,
        });
    }

    Ok(())
}

fn check_frames(field: &'static str, index: usize, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::LengthMismatch {
            field,
            index,
            expected,
            actual,
        });
    }

    Ok(())
}
