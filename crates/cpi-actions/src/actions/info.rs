//! The `info` action.

use cpi_dispatch::{Action, ActionContext, ActionFailure, NoArguments};
use serde::Serialize;

use crate::dependencies::Dependencies;

/// Stemcell image formats this interface accepts.
pub const STEMCELL_FORMATS: &[&str] = &["google-rawdisk", "google-light"];

/// Result of [`Info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoResult {
    /// Accepted stemcell formats.
    pub stemcell_formats: &'static [&'static str],
}

/// Describes the capabilities of this interface.
#[derive(Debug)]
pub struct Info;

impl Action for Info {
    type Dependencies = Dependencies;
    type Arguments = NoArguments;
    type Output = InfoResult;
    const PARAMETERS: &'static [&'static str] = &[];

    fn new(_dependencies: &Dependencies) -> Self {
        Self
    }

    fn run(&self, _: NoArguments, _: &ActionContext<'_>) -> Result<InfoResult, ActionFailure> {
        Ok(InfoResult {
            stemcell_formats: STEMCELL_FORMATS,
        })
    }
}
