//! Output payload: meta, cluster legend, nodes and links.
//!
//! Two node/link schemas are supported. The compact one uses short keys for
//! transfer size:
//!
//! ```text
//! node: { id, aid, t, au, pd, dm, ln, cid, [sm], [x], [y] }
//! link: { s, t, w }
//! ```
//!
//! The verbose one spells every field out:
//!
//! ```text
//! node: { id, external_id, title, authors, published, domain, summary, link,
//!         cluster_id, [x], [y] }
//! link: { source, target, weight }
//! ```
//!
//! In both, `id`/`s`/`t`/`source`/`target` are row indices for this run, not
//! item ids. Link weights are rounded to six decimals and canvas coordinates
//! are integers.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info};
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::{ClusterId, ClusterPartition, EmbeddingMatrix, Item};
use crate::error::GraphResult;
use crate::graph::Edge;
use crate::layout::LayoutResult;
use crate::neighbors::NeighborParams;

/// Domain shown for items without one.
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// Marker appended to truncated summaries.
pub const ELLIPSIS: char = '…';

/// Target pixel canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Canvas {
    pub w: u32,
    pub h: u32,
    pub pad: u32,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            w: 1000,
            h: 700,
            pad: 24,
        }
    }
}

impl Canvas {
    /// Map a normalised point to integer pixel coordinates.
    pub fn map(&self, p: [f64; 2]) -> (i32, i32) {
        (to_canvas(p[0], self.w, self.pad), to_canvas(p[1], self.h, self.pad))
    }
}

/// `pad + v · (extent − 2·pad)` with `v` clamped to `[0, 1]`, truncated.
pub fn to_canvas(v: f64, extent: u32, pad: u32) -> i32 {
    let v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
    let usable = extent as f64 - 2.0 * pad as f64;
    (pad as f64 + v * usable) as i32
}

/// Round half away from zero to six decimals.
pub fn round6(w: f64) -> f64 {
    (w * 1e6).round() / 1e6
}

/// Whitespace-trim and cut to `max_len` characters, marking the cut.
pub fn trim_summary(s: &str, max_len: usize) -> String {
    let s = s.trim();
    if s.chars().count() > max_len {
        let mut out: String = s.chars().take(max_len).collect();
        out.push(ELLIPSIS);
        out
    } else {
        s.to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordsMeta {
    pub included: bool,
    pub method: String,
    pub canvas: Canvas,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayloadMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub embedding_dim: usize,
    pub generated_at: String,
    pub neighbors: NeighborParams,
    pub coords: CoordsMeta,
    pub compact: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub label: Option<String>,
    pub size: usize,
}

/// Cluster id → summary, serialized as a JSON object keyed by the decimal id
/// in ascending numeric order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterLegend(pub Vec<(ClusterId, ClusterSummary)>);

impl ClusterLegend {
    pub fn get(&self, cid: ClusterId) -> Option<&ClusterSummary> {
        self.0.iter().find(|(c, _)| *c == cid).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ClusterLegend {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (cid, summary) in &self.0 {
            map.serialize_entry(&cid.to_string(), summary)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ClusterLegend {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: BTreeMap<String, ClusterSummary> = BTreeMap::deserialize(deserializer)?;
        let mut entries = raw
            .into_iter()
            .map(|(k, v)| {
                k.parse::<ClusterId>()
                    .map(|cid| (cid, v))
                    .map_err(|_| D::Error::custom(format!("invalid cluster id key {k:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|(cid, _)| *cid);
        Ok(ClusterLegend(entries))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompactNode {
    pub id: usize,
    pub aid: String,
    pub t: String,
    pub au: String,
    pub pd: String,
    pub dm: String,
    pub ln: String,
    pub cid: ClusterId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerboseNode {
    pub id: usize,
    pub external_id: String,
    pub title: String,
    pub authors: String,
    pub published: String,
    pub domain: String,
    pub summary: Option<String>,
    pub link: String,
    pub cluster_id: ClusterId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeRecord {
    Compact(CompactNode),
    Verbose(VerboseNode),
}

impl NodeRecord {
    pub fn row(&self) -> usize {
        match self {
            NodeRecord::Compact(n) => n.id,
            NodeRecord::Verbose(n) => n.id,
        }
    }

    pub fn cluster_id(&self) -> ClusterId {
        match self {
            NodeRecord::Compact(n) => n.cid,
            NodeRecord::Verbose(n) => n.cluster_id,
        }
    }

    pub fn position(&self) -> Option<(i32, i32)> {
        let (x, y) = match self {
            NodeRecord::Compact(n) => (n.x, n.y),
            NodeRecord::Verbose(n) => (n.x, n.y),
        };
        x.zip(y)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompactLink {
    pub s: usize,
    pub t: usize,
    pub w: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerboseLink {
    pub source: usize,
    pub target: usize,
    pub weight: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkRecord {
    Compact(CompactLink),
    Verbose(VerboseLink),
}

impl LinkRecord {
    pub fn endpoints(&self) -> (usize, usize) {
        match self {
            LinkRecord::Compact(l) => (l.s, l.t),
            LinkRecord::Verbose(l) => (l.source, l.target),
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            LinkRecord::Compact(l) => l.w,
            LinkRecord::Verbose(l) => l.weight,
        }
    }
}

/// The assembled graph, ready for serialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphPayload {
    pub meta: PayloadMeta,
    pub clusters: ClusterLegend,
    pub nodes: Vec<NodeRecord>,
    pub links: Vec<LinkRecord>,
}

impl GraphPayload {
    /// Compact JSON (no whitespace, UTF-8 left unescaped).
    pub fn to_json(&self) -> GraphResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> GraphResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn write_json<W: Write>(&self, writer: W) -> GraphResult<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Write to `path`, or to `path` + `.gz` gzip-compressed.
    /// Returns the path actually written.
    pub fn export(&self, path: impl AsRef<Path>, gzip: bool) -> GraphResult<PathBuf> {
        let target = if gzip {
            let mut p: OsString = path.as_ref().as_os_str().to_owned();
            p.push(".gz");
            PathBuf::from(p)
        } else {
            path.as_ref().to_path_buf()
        };

        let file = BufWriter::new(File::create(&target)?);
        if gzip {
            let mut encoder = GzEncoder::new(file, Compression::default());
            self.write_json(&mut encoder)?;
            encoder.finish()?.flush()?;
        } else {
            let mut file = file;
            self.write_json(&mut file)?;
            file.flush()?;
        }

        info!(
            "Exported graph to {} (nodes={} links={})",
            target.display(),
            self.nodes.len(),
            self.links.len()
        );
        Ok(target)
    }
}

/// Presentation options for [`GraphAssembler`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyOptions {
    pub compact: bool,
    pub include_summaries: bool,
    pub max_summary_len: usize,
    pub canvas: Canvas,
    pub model: Option<String>,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            compact: true,
            include_summaries: false,
            max_summary_len: 400,
            canvas: Canvas::default(),
            model: None,
        }
    }
}

/// Maps pipeline results onto the output payload.
#[derive(Clone, Debug, Default)]
pub struct GraphAssembler {
    options: AssemblyOptions,
    neighbors: NeighborParams,
    labels: HashMap<ClusterId, String>,
}

impl GraphAssembler {
    pub fn new(options: AssemblyOptions, neighbors: NeighborParams) -> Self {
        Self {
            options,
            neighbors,
            labels: HashMap::new(),
        }
    }

    pub fn with_labels(mut self, labels: HashMap<ClusterId, String>) -> Self {
        self.labels = labels;
        self
    }

    /// Assemble with the current UTC time as `generated_at`.
    pub fn assemble(
        &self,
        items: &[Item],
        matrix: &EmbeddingMatrix,
        partition: &ClusterPartition,
        edges: &[Edge],
        layout: &LayoutResult,
    ) -> GraphPayload {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false);
        self.assemble_at(items, matrix, partition, edges, layout, now)
    }

    /// Assemble with a fixed `generated_at`; identical inputs give identical
    /// payloads.
    pub fn assemble_at(
        &self,
        items: &[Item],
        matrix: &EmbeddingMatrix,
        partition: &ClusterPartition,
        edges: &[Edge],
        layout: &LayoutResult,
        generated_at: String,
    ) -> GraphPayload {
        let opts = &self.options;
        let coords: Option<Vec<(i32, i32)>> = (layout.has_coordinates()
            && layout.points.len() == items.len())
        .then(|| layout.points.iter().map(|&p| opts.canvas.map(p)).collect());

        let nodes: Vec<NodeRecord> = items
            .iter()
            .enumerate()
            .map(|(i, item)| self.node(i, item, coords.as_ref().map(|c| c[i])))
            .collect();

        let links: Vec<LinkRecord> = edges
            .iter()
            .map(|e| {
                let w = round6(e.weight);
                if opts.compact {
                    LinkRecord::Compact(CompactLink { s: e.a, t: e.b, w })
                } else {
                    LinkRecord::Verbose(VerboseLink {
                        source: e.a,
                        target: e.b,
                        weight: w,
                    })
                }
            })
            .collect();

        let clusters = ClusterLegend(
            partition
                .iter()
                .map(|(cid, rows)| {
                    (
                        cid,
                        ClusterSummary {
                            label: self.labels.get(&cid).cloned(),
                            size: rows.len(),
                        },
                    )
                })
                .collect(),
        );

        let meta = PayloadMeta {
            model: opts.model.clone(),
            embedding_dim: matrix.dim(),
            generated_at,
            neighbors: self.neighbors.clone(),
            coords: CoordsMeta {
                included: coords.is_some(),
                method: layout.method.as_str().to_string(),
                canvas: opts.canvas,
            },
            compact: opts.compact,
        };
        debug!(
            "Assembled payload: {} nodes, {} links, {} clusters, coords={}",
            nodes.len(),
            links.len(),
            clusters.len(),
            meta.coords.included
        );

        GraphPayload {
            meta,
            clusters,
            nodes,
            links,
        }
    }

    fn node(&self, row: usize, item: &Item, xy: Option<(i32, i32)>) -> NodeRecord {
        let opts = &self.options;
        let md = &item.metadata;
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        let domain = md.domain.clone().unwrap_or_else(|| UNKNOWN_DOMAIN.to_string());
        let link = md.link.clone().unwrap_or_else(|| item.id.clone());
        let summary = if opts.include_summaries {
            md.summary.as_deref().map(|s| trim_summary(s, opts.max_summary_len))
        } else {
            None
        };
        let (x, y) = (xy.map(|p| p.0), xy.map(|p| p.1));

        if opts.compact {
            NodeRecord::Compact(CompactNode {
                id: row,
                aid: item.id.clone(),
                t: text(&md.title),
                au: text(&md.authors),
                pd: text(&md.published),
                dm: domain,
                ln: link,
                cid: item.cluster_id,
                sm: summary,
                x,
                y,
            })
        } else {
            NodeRecord::Verbose(VerboseNode {
                id: row,
                external_id: item.id.clone(),
                title: text(&md.title),
                authors: text(&md.authors),
                published: text(&md.published),
                domain,
                summary,
                link,
                cluster_id: item.cluster_id,
                x,
                y,
            })
        }
    }
}
