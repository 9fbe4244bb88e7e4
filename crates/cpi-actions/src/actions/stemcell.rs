//! Stemcell actions.

use cpi_dispatch::{Acknowledged, Action, ActionContext, ActionFailure};
use serde_json::{Map, Value};
use tracing::info;

use super::{ACTIONS_TARGET, rejects_blank};
use crate::dependencies::Dependencies;
use crate::infra::{Resource, ResourceKind};

/// Imports a stemcell image and returns its cid.
#[derive(Debug)]
pub struct CreateStemcell {
    dependencies: Dependencies,
}

impl Action for CreateStemcell {
    type Dependencies = Dependencies;
    type Arguments = (String, Map<String, Value>);
    type Output = String;
    const PARAMETERS: &'static [&'static str] = &["image_path", "cloud_properties"];

    fn new(dependencies: &Dependencies) -> Self {
        Self {
            dependencies: dependencies.clone(),
        }
    }

    fn run(
        &self,
        (image_path, cloud_properties): Self::Arguments,
        _context: &ActionContext<'_>,
    ) -> Result<String, ActionFailure> {
        rejects_blank("image_path", &image_path)?;
        let cid = self.dependencies.next_cid("stemcell");
        let stemcell = Resource::new(ResourceKind::Stemcell, cid.as_str())
            .with_property("image_path", image_path)
            .with_property("cloud_properties", cloud_properties)
            .with_property("project", self.dependencies.config().project());
        self.dependencies.infra().create(stemcell)?;
        info!(target: ACTIONS_TARGET, stemcell_cid = cid.as_str(), "created stemcell");
        Ok(cid)
    }
}

/// Deletes a stemcell.
#[derive(Debug)]
pub struct DeleteStemcell {
    dependencies: Dependencies,
}

impl Action for DeleteStemcell {
    type Dependencies = Dependencies;
    type Arguments = (String,);
    type Output = Acknowledged;
    const PARAMETERS: &'static [&'static str] = &["stemcell_cid"];

    fn new(dependencies: &Dependencies) -> Self {
        Self {
            dependencies: dependencies.clone(),
        }
    }

    fn run(
        &self,
        (stemcell_cid,): Self::Arguments,
        _context: &ActionContext<'_>,
    ) -> Result<Acknowledged, ActionFailure> {
        self.dependencies
            .infra()
            .delete(ResourceKind::Stemcell, &stemcell_cid)?;
        info!(target: ACTIONS_TARGET, stemcell_cid = stemcell_cid.as_str(), "deleted stemcell");
        Ok(Acknowledged)
    }
}
