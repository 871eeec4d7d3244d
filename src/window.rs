//! Fixed-length observation windows cut from full pedestrian tracks.
//!
//! A window spans `obs_length` frames and ends `time_to_event` frames before
//! the end of the track. With normalization enabled boxes and centers become
//! displacements from the window's first frame, which is then dropped, so every
//! field of a normalized window holds `obs_length - 1` steps.

use crate::bbox::{BBox, Ltrb};
use crate::error::{Error, Result};
use crate::track::Track;

use nalgebra as na;

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub ped_id: String,
    /// Box coordinates, displacements from the first window frame when normalized
    pub boxes: Vec<[f32; 4]>,
    /// Unnormalized boxes aligned with `images`, used for cropping
    pub boxes_org: Vec<BBox<Ltrb>>,
    pub centers: Vec<[f32; 2]>,
    pub images: Vec<String>,
    pub speed: Option<Vec<f32>>,
    pub label: u8,
}

impl Sample {
    #[inline]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct WindowedBatch {
    pub samples: Vec<Sample>,
    pub window_len: usize,
}

impl WindowedBatch {
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = u8> + '_ {
        self.samples.iter().map(|s| s.label)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
}

/// Number of steps every field holds after windowing.
#[inline]
pub fn window_len(obs_length: usize, normalize: bool) -> usize {
    if normalize {
        obs_length.saturating_sub(1)
    } else {
        obs_length
    }
}

pub fn window(
    tracks: &[Track],
    obs_length: usize,
    time_to_event: usize,
    normalize: bool,
) -> Result<WindowedBatch> {
    let min_obs = if normalize { 2 } else { 1 };
    if obs_length < min_obs {
        return Err(Error::InvalidConfig(format!(
            "obs_length must be at least {} (normalize = {}), got {}",
            min_obs, normalize, obs_length
        )));
    }

    log::info!(
        "windowing {} tracks: obs_length = {}, time_to_event = {}, normalize = {}",
        tracks.len(),
        obs_length,
        time_to_event,
        normalize
    );

    let required = obs_length + time_to_event;
    let len = window_len(obs_length, normalize);

    let samples = tracks
        .iter()
        .enumerate()
        .map(|(index, track)| {
            if track.len() < required {
                return Err(Error::TrackTooShort {
                    index,
                    ped_id: track.ped_id.clone(),
                    required,
                    actual: track.len(),
                });
            }

            Ok(window_track(track, obs_length, time_to_event, normalize))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(WindowedBatch {
        samples,
        window_len: len,
    })
}

fn window_track(track: &Track, obs_length: usize, time_to_event: usize, normalize: bool) -> Sample {
    let end = track.len() - time_to_event;
    let geometry = &track.frames[end - obs_length..end];

    let (boxes, centers): (Vec<[f32; 4]>, Vec<[f32; 2]>) = if normalize {
        let b0 = *geometry[0].bbox.as_slice();
        let c0 = geometry[0].center;

        geometry[1..]
            .iter()
            .map(|f| {
                let b = f.bbox.as_slice();
                let c: na::Vector2<f32> = f.center - c0;

                (
                    [b[0] - b0[0], b[1] - b0[1], b[2] - b0[2], b[3] - b0[3]],
                    [c.x, c.y],
                )
            })
            .unzip()
    } else {
        geometry
            .iter()
            .map(|f| (*f.bbox.as_slice(), [f.center.x, f.center.y]))
            .unzip()
    };

    let rest = &track.frames[end - window_len(obs_length, normalize)..end];

    let speed = rest
        .iter()
        .map(|f| f.speed)
        .collect::<Option<Vec<f32>>>();

    Sample {
        ped_id: track.ped_id.clone(),
        boxes,
        boxes_org: rest.iter().map(|f| f.bbox).collect(),
        centers,
        images: rest.iter().map(|f| f.image.clone()).collect(),
        speed,
        label: rest[0].label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    fn track(len: usize, label_from: usize) -> Track {
        let frames = (0..len)
            .map(|t| Frame {
                image: format!("images/set01/video_0001/{:05}.png", t),
                bbox: BBox::ltrb(t as f32, 2.0 * t as f32, t as f32 + 10.0, 50.0),
                center: na::Point2::new(t as f32 + 5.0, 1.0),
                label: (t >= label_from) as u8,
                speed: Some(t as f32),
            })
            .collect();

        Track::new("0_1_2", frames)
    }

    #[test]
    fn window_ends_time_to_event_before_the_end() {
        let batch = window(&[track(90, 0)], 15, 60, false).unwrap();
        let s = &batch.samples[0];

        assert_eq!(batch.window_len, 15);
        assert_eq!(s.len(), 15);
        assert_eq!(s.boxes.len(), 15);
        assert_eq!(s.boxes[0][0], 15.0);
        assert_eq!(s.boxes[14][0], 29.0);
        assert_eq!(s.images[14], "images/set01/video_0001/00029.png");
        assert_eq!(s.speed.as_deref().map(|v| v[0]), Some(15.0));
    }

    #[test]
    fn zero_time_to_event_ends_at_last_frame() {
        let batch = window(&[track(20, 0)], 5, 0, false).unwrap();
        let s = &batch.samples[0];

        assert_eq!(s.boxes.len(), 5);
        assert_eq!(s.boxes[4][0], 19.0);
        assert_eq!(s.images[0], "images/set01/video_0001/00015.png");
    }

    #[test]
    fn normalized_window_is_displacement_from_first_frame() {
        let batch = window(&[track(90, 0)], 15, 60, true).unwrap();
        let s = &batch.samples[0];

        assert_eq!(batch.window_len, 14);
        assert_eq!(s.boxes.len(), 14);
        assert_eq!(s.centers.len(), 14);
        assert_eq!(s.images.len(), 14);
        assert_eq!(s.boxes_org.len(), 14);
        assert_eq!(s.speed.as_ref().map(Vec::len), Some(14));

        // frame 16 relative to frame 15, frame 29 relative to frame 15
        assert_eq!(s.boxes[0], [1.0, 2.0, 1.0, 0.0]);
        assert_eq!(s.boxes[13], [14.0, 28.0, 14.0, 0.0]);
        assert_eq!(s.centers[13], [14.0, 0.0]);

        // the other fields stay aligned with the displaced boxes
        assert_eq!(s.images[0], "images/set01/video_0001/00016.png");
        assert_eq!(s.boxes_org[0].left(), 16.0);
    }

    #[test]
    fn label_is_first_window_frame() {
        let batch = window(&[track(90, 20), track(90, 14)], 15, 60, false).unwrap();
        let labels: Vec<_> = batch.labels().collect();

        assert_eq!(labels, vec![0, 1]);
    }

    #[test]
    fn short_track_is_an_error() {
        let err = window(&[track(90, 0), track(70, 0)], 15, 60, true).unwrap_err();

        assert!(matches!(
            err,
            Error::TrackTooShort { index: 1, required: 75, actual: 70, .. }
        ));
    }

    #[test]
    fn degenerate_obs_length_is_rejected() {
        assert!(matches!(
            window(&[track(10, 0)], 1, 0, true),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn missing_speed_yields_none() {
        let mut t = track(10, 0);
        t.frames[9].speed = None;

        let batch = window(&[t], 3, 0, false).unwrap();
        assert_eq!(batch.samples[0].speed, None);
    }
}
