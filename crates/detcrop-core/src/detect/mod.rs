//! Object detection over decoded images.
//!
//! The model itself is a collaborator behind the [`Model`] trait; this
//! module owns everything around it: input preprocessing, output tensor
//! decoding, non-maximum suppression, and the label table.

mod decode;
mod labels;
mod model;
mod types;

pub use decode::{decode_output, non_max_suppression, Candidate, DecodeContext};
pub use labels::ClassNames;
pub use model::{detect, preprocess, Model};
pub use types::{DetectError, Detection, ModelOutput};
