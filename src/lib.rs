pub mod assemble;
pub mod balance;
pub mod bbox;
pub mod config;
pub mod crop;
pub mod dataset;
pub mod error;
pub mod feature_cache;
pub mod frame;
pub mod tensor;
pub mod window;

mod track;

pub use assemble::{assemble, Assembled, Assembler, SplitTensors};
pub use balance::{balance, BalanceReport};
pub use config::{InputType, ModelOpts, ModelOptsOverride};
pub use crop::{CropMode, CropPolicy};
pub use dataset::{Dataset, RawSplit, Split};
pub use feature_cache::{FeatureCache, FeatureExtractor};
pub use frame::Frame;
pub use tensor::FeatureTensor;
pub use track::Track;
pub use window::{window, Sample, WindowedBatch};

pub use error::{Error, Result};
