//! # FIT Activity Import
//!
//! Device activity files (Garmin FIT and compatible) are decoded into the
//! vendor's session/lap/record hierarchy and then normalized into a
//! [`ParsedFitActivity`]: a session summary, laps, per-kilometer splits and a
//! downsampled record stream. The normalized shape matches what a live
//! recording produces, so consumers do not need to know where an activity
//! came from.
//!
//! Decoding and transformation hold no state; independent files can be
//! processed concurrently.

mod decode;
mod transform;
mod types;

pub use decode::decode_fit;
pub use transform::{transform, TransformConfig, DEFAULT_RECORD_SAMPLE_EVERY};
pub use types::{
    FitKmSplit, FitLap, FitNumber, FitRecord, ParsedFitActivity, RawFitData, RawLap, RawRecord,
    RawSession, SessionSummary,
};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::Result;

/// Decode and normalize one FIT file with the default [`TransformConfig`].
///
/// Either the whole file transforms or the call fails with
/// [`crate::IngestError::DecodeFailed`].
pub fn parse_fit_activity(bytes: &[u8]) -> Result<ParsedFitActivity> {
    parse_fit_activity_with_config(bytes, &TransformConfig::default())
}

/// Decode and normalize one FIT file.
pub fn parse_fit_activity_with_config(
    bytes: &[u8],
    config: &TransformConfig,
) -> Result<ParsedFitActivity> {
    let raw = decode_fit(bytes)?;
    Ok(transform(&raw, config))
}

/// Parse several files. Results are in input order; one bad file does not
/// affect the others.
pub fn parse_fit_files(files: &[Vec<u8>]) -> Vec<Result<ParsedFitActivity>> {
    files.iter().map(|bytes| parse_fit_activity(bytes)).collect()
}

/// Parallel version of [`parse_fit_files`].
#[cfg(feature = "parallel")]
pub fn parse_fit_files_parallel(files: &[Vec<u8>]) -> Vec<Result<ParsedFitActivity>> {
    files.par_iter().map(|bytes| parse_fit_activity(bytes)).collect()
}
