//! Operation configuration
//!
//! - Unvalidated `*Params` deserialised from YAML
//! - Validated `*Config` values the pipeline accepts
//! - YAML loading that fails loudly instead of defaulting

mod io;
mod operation;

pub use io::{load_config, parse_config};
pub use operation::{
    ConvertConfig, ConvertParams, DetectTempoConfig, DetectTempoParams, InputConfig, InputParams,
    NormalizeConfig, NormalizeParams, OutputParams, OutputTarget, StretchTarget,
    TimeStretchConfig, TimeStretchParams, DEFAULT_TARGET_LUFS,
};
