//! Analysis backend selection
//!
//! The built-in backend is pure Rust. The `essentia` feature adds Essentia's
//! RhythmExtractor2013 and LoudnessEBUR128 as drop-in collaborators.

#[cfg(feature = "essentia")]
mod essentia_backend;

use anyhow::Result;
use tempokit_core::Collaborators;

use crate::config::{AnalysisBackend, Settings};

#[cfg(feature = "essentia")]
pub use essentia_backend::{EssentiaLoudnessMeter, EssentiaTempoEstimator};

/// Build the pipeline collaborators described by `settings`
pub fn collaborators(settings: &Settings) -> Result<Collaborators> {
    #[allow(unused_mut)]
    let mut collab = Collaborators::defaults(settings.analysis.bpm, settings.stretch.seed);

    match settings.analysis.backend {
        AnalysisBackend::Onset => {}
        #[cfg(feature = "essentia")]
        AnalysisBackend::Essentia => {
            collab.estimator = Box::new(EssentiaTempoEstimator::new(settings.analysis.bpm));
            collab.meter = Box::new(EssentiaLoudnessMeter);
        }
        #[cfg(not(feature = "essentia"))]
        AnalysisBackend::Essentia => {
            anyhow::bail!("analysis backend `essentia` requires building with the `essentia` feature")
        }
    }

    Ok(collab)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_builds() {
        let collab = collaborators(&Settings::default()).unwrap();
        assert_eq!(collab.estimator.name(), "onset");
        assert_eq!(collab.meter.name(), "ebur128");
    }

    #[cfg(not(feature = "essentia"))]
    #[test]
    fn test_essentia_backend_needs_feature() {
        let mut settings = Settings::default();
        settings.analysis.backend = AnalysisBackend::Essentia;
        assert!(collaborators(&settings).is_err());
    }
}
