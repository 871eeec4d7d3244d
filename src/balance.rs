use crate::track::Track;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::collections::HashSet;

pub const SUBSAMPLE_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceReport {
    /// (positive, negative) before balancing
    pub before: (usize, usize),
    /// (positive, negative) after balancing
    pub after: (usize, usize),
    pub mirrored: usize,
    pub dropped: usize,
}

/// (positive, negative) counts by track label
pub fn count_labels(tracks: &[Track]) -> (usize, usize) {
    let pos = tracks.iter().filter(|t| t.label() == Some(1)).count();

    (pos, tracks.len() - pos)
}

/// Equalizes crossing/not-crossing tracks.
///
/// Every track of the minority class gets a horizontally mirrored duplicate
/// appended, then the surplus of whichever class is larger afterwards is
/// dropped from a seeded shuffle of its indices. A split lacking one class
/// entirely is returned untouched.
pub fn balance(mut tracks: Vec<Track>, image_width: f32) -> (Vec<Track>, BalanceReport) {
    let before = count_labels(&tracks);
    let (pos, neg) = before;

    let mut report = BalanceReport {
        before,
        after: before,
        ..Default::default()
    };

    if pos == neg {
        log::info!("positive and negative samples are already balanced");
        return (tracks, report);
    }

    if pos == 0 || neg == 0 {
        log::warn!(
            "cannot balance a split with a single class: positive {}, negative {}",
            pos,
            neg
        );
        return (tracks, report);
    }

    log::info!("unbalanced: positive {}, negative {}", pos, neg);

    let minority = if neg > pos { 1 } else { 0 };
    let mirrored: Vec<Track> = tracks
        .iter()
        .filter(|t| t.label() == Some(minority))
        .map(|t| t.flipped(image_width))
        .collect();

    report.mirrored = mirrored.len();
    tracks.extend(mirrored);

    let (pos, neg) = count_labels(&tracks);
    if pos != neg {
        let majority = if neg > pos { 0 } else { 1 };
        let mut candidates: Vec<usize> = tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.label() == Some(majority))
            .map(|(i, _)| i)
            .collect();

        let mut rng = StdRng::seed_from_u64(SUBSAMPLE_SEED);
        candidates.shuffle(&mut rng);

        let surplus = pos.abs_diff(neg);
        let drop: HashSet<usize> = candidates.into_iter().take(surplus).collect();

        report.dropped = drop.len();
        tracks = tracks
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !drop.contains(i))
            .map(|(_, t)| t)
            .collect();
    }

    report.after = count_labels(&tracks);
    log::info!(
        "balanced: positive {}, negative {} ({} mirrored, {} dropped)",
        report.after.0,
        report.after.1,
        report.mirrored,
        report.dropped
    );

    (tracks, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::frame::Frame;
    use nalgebra as na;

    fn track(id: usize, label: u8) -> Track {
        let frames = (0..5)
            .map(|t| Frame {
                image: format!("images/set01/video_0001/{:05}.png", t),
                bbox: BBox::ltrb(10.0 + id as f32, 0.0, 30.0 + id as f32, 40.0),
                center: na::Point2::new(20.0 + id as f32, 20.0),
                label,
                speed: None,
            })
            .collect();

        Track::new(format!("ped_{}", id), frames)
    }

    fn split(pos: usize, neg: usize) -> Vec<Track> {
        (0..pos)
            .map(|i| track(i, 1))
            .chain((pos..pos + neg).map(|i| track(i, 0)))
            .collect()
    }

    #[test]
    fn already_balanced_is_untouched() {
        let tracks = split(4, 4);
        let (out, report) = balance(tracks.clone(), 100.0);

        assert_eq!(out, tracks);
        assert_eq!(report.mirrored, 0);
        assert_eq!(report.dropped, 0);
    }

    #[test]
    fn three_positive_seven_negative() {
        let (out, report) = balance(split(3, 7), 1920.0);

        // 3 mirrored positives -> 6/7, one negative dropped -> 6/6
        assert_eq!(report.before, (3, 7));
        assert_eq!(report.mirrored, 3);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.after, (6, 6));
        assert_eq!(count_labels(&out), (6, 6));
        assert_eq!(out.len(), 12);
    }

    #[test]
    fn mirrored_tracks_use_flipped_images_and_geometry() {
        let (out, _) = balance(split(1, 3), 100.0);
        let flipped: Vec<_> = out
            .iter()
            .filter(|t| t.frames[0].image.contains("_flip"))
            .collect();

        assert_eq!(flipped.len(), 1);
        let f = &flipped[0].frames[0];
        assert_eq!(f.bbox.as_slice(), &[70.0, 0.0, 90.0, 40.0]);
        assert_eq!(f.center.x, 80.0);
        assert_eq!(flipped[0].ped_id, "ped_0");
    }

    #[test]
    fn subsampling_is_reproducible() {
        let (a, _) = balance(split(2, 9), 640.0);
        let (b, _) = balance(split(2, 9), 640.0);

        assert_eq!(a, b);
        assert_eq!(count_labels(&a), (4, 4));
    }

    #[test]
    fn positive_majority_is_subsampled() {
        let (out, report) = balance(split(8, 3), 640.0);

        assert_eq!(report.mirrored, 3);
        assert_eq!(count_labels(&out), (6, 6));
    }

    #[test]
    fn single_class_split_is_left_alone() {
        let tracks = split(0, 5);
        let (out, report) = balance(tracks.clone(), 640.0);

        assert_eq!(out, tracks);
        assert_eq!(report.after, (0, 5));
    }

    #[test]
    fn balancing_leaves_retained_order() {
        let (out, _) = balance(split(3, 7), 1920.0);
        let originals: Vec<_> = out
            .iter()
            .filter(|t| !t.frames[0].image.contains("_flip"))
            .map(|t| t.ped_id.clone())
            .collect();

        let mut sorted = originals.clone();
        sorted.sort_by_key(|id| id[4..].parse::<usize>().unwrap());
        assert_eq!(originals, sorted);
    }
}
