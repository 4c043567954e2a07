//! Layered configuration for a pipeline run.
//!
//! Sources, later overriding earlier:
//!
//! 1. [`GraphConfig::default`]
//! 2. an optional TOML file
//! 3. environment variables prefixed `SIMGRAPH_`, with `__` separating
//!    nesting levels (`SIMGRAPH_NEIGHBORS__TOP_K=12`,
//!    `SIMGRAPH_LAYOUT__STRATEGY=umap`)
//!
//! ```toml
//! add_cluster_mst = true
//! gzip = false
//!
//! [neighbors]
//! top_k = 8
//! min_sim = 0.85
//!
//! [layout]
//! strategy = "fa2"
//!
//! [layout.force_atlas]
//! iterations = 800
//!
//! [output.canvas]
//! w = 1000
//! h = 700
//! pad = 24
//!
//! [labels]
//! "0" = "Interpretability"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::builder::{GraphParams, SimGraphBuilder};
use crate::core::ClusterId;
use crate::error::{GraphError, GraphResult};
use crate::layout::LayoutParams;
use crate::neighbors::NeighborParams;
use crate::payload::{AssemblyOptions, GraphPayload};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SIMGRAPH_";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub neighbors: NeighborParams,
    pub add_cluster_mst: bool,
    pub layout: LayoutParams,
    pub output: AssemblyOptions,
    /// Write the payload gzip-compressed.
    pub gzip: bool,
    /// Cluster labels keyed by decimal cluster id.
    pub labels: HashMap<String, String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        let params = GraphParams::default();
        Self {
            neighbors: params.neighbors,
            add_cluster_mst: params.add_cluster_mst,
            layout: params.layout,
            output: params.output,
            gzip: false,
            labels: HashMap::new(),
        }
    }
}

impl GraphConfig {
    /// The provider stack, for callers that want to merge their own layers.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(GraphConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).map(|key| {
            key.as_str()
                .to_lowercase()
                .replace("__", ".")
                .into()
        }))
    }

    /// Load defaults, then `path` (if given and present), then the environment.
    pub fn load(path: Option<&Path>) -> GraphResult<Self> {
        if let Some(p) = path {
            info!("Loading configuration from {}", p.display());
        }
        let config: GraphConfig = Self::figment(path).extract()?;
        debug!("Resolved configuration: {:?}", config);
        config.params().validate()?;
        Ok(config)
    }

    pub fn params(&self) -> GraphParams {
        GraphParams {
            neighbors: self.neighbors.clone(),
            add_cluster_mst: self.add_cluster_mst,
            layout: self.layout.clone(),
            output: self.output.clone(),
        }
    }

    /// Labels with parsed cluster ids.
    pub fn cluster_labels(&self) -> GraphResult<HashMap<ClusterId, String>> {
        self.labels
            .iter()
            .map(|(k, v)| {
                k.trim()
                    .parse::<ClusterId>()
                    .map(|cid| (cid, v.clone()))
                    .map_err(|_| GraphError::InvalidParameter(format!("label key {k:?} is not a cluster id")))
            })
            .collect()
    }

    /// Equivalent programmatic builder. The builder carries no output
    /// settings; write its payload with [`GraphConfig::export`].
    pub fn into_builder(self) -> GraphResult<SimGraphBuilder> {
        let labels = self.cluster_labels()?;
        Ok(SimGraphBuilder::from_params(self.params()).with_labels(labels))
    }

    /// Write `payload` to `path`, compressed when `gzip` is set.
    pub fn export(&self, payload: &GraphPayload, path: impl AsRef<Path>) -> GraphResult<PathBuf> {
        payload.export(path, self.gzip)
    }
}
