//! Multi-modal consensus scoring and ground-truth cross-validation for
//! mineral and hydrocarbon prospect evaluation.

pub mod conflict;
pub mod consensus;
pub mod error;
pub mod geo;
pub mod labels;
pub mod modality;
pub mod pipeline;
pub mod profile;
pub mod risk;
pub mod temporal;
pub mod util;
pub mod vault;

pub use error::{CoreError, Result};
