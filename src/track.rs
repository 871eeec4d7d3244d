use crate::frame::Frame;

/// One pedestrian's observation across a video clip.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub ped_id: String,
    pub frames: Vec<Frame>,
}

impl Track {
    pub fn new(ped_id: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            ped_id: ped_id.into(),
            frames,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Label of the first frame; this is what balancing counts.
    #[inline]
    pub fn label(&self) -> Option<u8> {
        self.frames.first().map(|f| f.label)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    pub fn flipped(&self, width: f32) -> Self {
        Self {
            ped_id: self.ped_id.clone(),
            frames: self.frames.iter().map(|f| f.flipped(width)).collect(),
        }
    }
}
