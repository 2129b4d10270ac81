//! The mesh-statistics collaborator.
//!
//! The evaluator never touches mesh data directly. Every field-level query
//! goes through [`MeshStatistics`], whose answers are assumed to be already
//! globally reduced and consistent across ranks. [`PointMesh`] is an
//! in-memory point cloud implementing the full trait for tests and for the
//! scenario runner.

use cadence_foundation::{
    Aabb, Association, Axis, BinReduction, Cycle, ElementInfo, Lineout, SimTime,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::binning;
use crate::error::{Error, Result};
use crate::reductions;
use crate::stats;

/// Field-level reduction kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStat {
    Min,
    Max,
    Sum,
    Avg,
    NanCount,
    InfCount,
}

impl FieldStat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldStat::Min => "min",
            FieldStat::Max => "max",
            FieldStat::Sum => "sum",
            FieldStat::Avg => "avg",
            FieldStat::NanCount => "nan_count",
            FieldStat::InfCount => "inf_count",
        }
    }

    /// Whether the reduction reports where its value was found.
    pub fn is_located(&self) -> bool {
        matches!(self, FieldStat::Min | FieldStat::Max)
    }
}

/// Answer to a field reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldReduction {
    pub value: f64,
    pub position: Option<[f64; 3]>,
    pub element: Option<ElementInfo>,
}

/// A validated reduction binning handed to the collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct BinningRequest {
    /// Field name, `x`/`y`/`z`, or empty for count-like reductions.
    pub reduction_var: String,
    pub component: Option<String>,
    pub reduction_op: BinReduction,
    pub axes: Vec<Axis>,
    pub empty_bin_val: f64,
}

/// Flattened bins, first axis varying fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct BinningOutput {
    pub values: Vec<f64>,
    pub association: Association,
}

/// Sampling request for a lineout.
#[derive(Debug, Clone, PartialEq)]
pub struct LineoutRequest {
    pub start: [f64; 3],
    pub end: [f64; 3],
    pub num_samples: usize,
    pub fields: Vec<String>,
    pub empty_value: f64,
}

/// Index of a coordinate axis name.
pub fn coordinate_axis(name: &str) -> Option<usize> {
    match name {
        "x" => Some(0),
        "y" => Some(1),
        "z" => Some(2),
        _ => None,
    }
}

/// Globally reduced queries against the currently published dataset.
pub trait MeshStatistics {
    fn cycle(&self) -> Cycle;

    fn time(&self) -> Option<SimTime>;

    fn field_names(&self) -> Vec<String>;

    fn has_field(&self, field: &str) -> bool {
        self.field_names().iter().any(|name| name == field)
    }

    /// Component names of a multi-component field; empty for scalars.
    fn possible_components(&self, field: &str) -> Vec<String>;

    fn is_scalar_field(&self, field: &str) -> bool {
        self.has_field(field) && self.possible_components(field).is_empty()
    }

    /// 1 for scalars, 0 for unknown fields.
    fn num_components(&self, field: &str) -> usize {
        if !self.has_field(field) {
            return 0;
        }
        self.possible_components(field).len().max(1)
    }

    fn has_component(&self, field: &str, component: &str) -> bool {
        self.possible_components(field).iter().any(|c| c == component)
    }

    fn topology_names(&self) -> Vec<String>;

    fn has_topology(&self, topology: &str) -> bool {
        self.topology_names().iter().any(|name| name == topology)
    }

    /// Spatial extent of a topology, or of the whole dataset.
    fn bounds(&self, topology: Option<&str>) -> Result<Aabb>;

    fn field_reduction(
        &self,
        stat: FieldStat,
        field: &str,
        component: Option<&str>,
    ) -> Result<FieldReduction>;

    /// Bucket counts of a scalar field.
    fn field_histogram(
        &self,
        field: &str,
        min_val: f64,
        max_val: f64,
        num_bins: usize,
    ) -> Result<Vec<f64>>;

    fn binning(&self, request: &BinningRequest) -> Result<BinningOutput>;

    fn lineout(&self, _request: &LineoutRequest) -> Result<Lineout> {
        Err(Error::not_implemented(
            "lineout",
            "the mesh collaborator does not support lineouts",
        ))
    }
}

/// Per-point field data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldData {
    Scalar(Vec<f64>),
    Components(IndexMap<String, Vec<f64>>),
}

/// In-memory point cloud with named per-point fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointMesh {
    pub cycle: Cycle,
    #[serde(default)]
    pub time: Option<SimTime>,
    #[serde(default = "PointMesh::default_topology")]
    pub topology: String,
    pub coordinates: Vec<[f64; 3]>,
    #[serde(default)]
    pub fields: IndexMap<String, FieldData>,
}

impl PointMesh {
    fn default_topology() -> String {
        "mesh".to_string()
    }

    pub fn new(cycle: Cycle, time: Option<SimTime>, coordinates: Vec<[f64; 3]>) -> Self {
        Self {
            cycle,
            time,
            topology: Self::default_topology(),
            coordinates,
            fields: IndexMap::new(),
        }
    }

    pub fn with_scalar(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.fields.insert(name.into(), FieldData::Scalar(values));
        self
    }

    pub fn with_components(
        mut self,
        name: impl Into<String>,
        components: impl IntoIterator<Item = (impl Into<String>, Vec<f64>)>,
    ) -> Self {
        let components = components.into_iter().map(|(c, v)| (c.into(), v)).collect();
        self.fields.insert(name.into(), FieldData::Components(components));
        self
    }

    /// Checks that every field has one value per point.
    pub fn validate(&self) -> Result<()> {
        let n = self.coordinates.len();
        for (name, data) in &self.fields {
            let columns: Vec<&Vec<f64>> = match data {
                FieldData::Scalar(values) => vec![values],
                FieldData::Components(components) => components.values().collect(),
            };
            if let Some(bad) = columns.iter().find(|c| c.len() != n) {
                return Err(Error::Collaborator(format!(
                    "field '{name}' has {} values for {n} points",
                    bad.len()
                )));
            }
        }
        Ok(())
    }

    /// Samples of `field` (or a coordinate axis), selecting `component`.
    fn column(&self, field: &str, component: Option<&str>) -> Result<Vec<f64>> {
        if let Some(axis) = coordinate_axis(field)
            && !self.fields.contains_key(field)
        {
            return Ok(self.coordinates.iter().map(|p| p[axis]).collect());
        }
        match (self.fields.get(field), component) {
            (None, _) => Err(Error::UnknownField {
                node: "mesh".to_string(),
                field: field.to_string(),
                known: self.field_names(),
            }),
            (Some(FieldData::Scalar(values)), None) => Ok(values.clone()),
            (Some(FieldData::Scalar(_)), Some(c)) => Err(Error::ComponentMismatch {
                node: "mesh".to_string(),
                message: format!("field '{field}' is scalar but component '{c}' was requested"),
            }),
            (Some(FieldData::Components(components)), Some(c)) => {
                components.get(c).cloned().ok_or_else(|| Error::ComponentMismatch {
                    node: "mesh".to_string(),
                    message: format!("field '{field}' has no component '{c}'"),
                })
            }
            (Some(FieldData::Components(components)), None) => {
                // Whole-vector queries reduce the magnitude.
                let n = self.coordinates.len();
                (0..n)
                    .map(|i| {
                        let mut squares = 0.0;
                        for (name, c) in components {
                            let x = c.get(i).ok_or_else(|| {
                                Error::validation(
                                    "mesh",
                                    format!(
                                        "component '{name}' of field '{field}' has {} values for {n} points",
                                        c.len()
                                    ),
                                )
                            })?;
                            squares += x * x;
                        }
                        Ok(squares.sqrt())
                    })
                    .collect()
            }
        }
    }
}

impl MeshStatistics for PointMesh {
    fn cycle(&self) -> Cycle {
        self.cycle
    }

    fn time(&self) -> Option<SimTime> {
        self.time
    }

    fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    fn possible_components(&self, field: &str) -> Vec<String> {
        match self.fields.get(field) {
            Some(FieldData::Components(components)) => components.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    fn topology_names(&self) -> Vec<String> {
        vec![self.topology.clone()]
    }

    fn bounds(&self, topology: Option<&str>) -> Result<Aabb> {
        if let Some(name) = topology
            && name != self.topology
        {
            return Err(Error::Collaborator(format!(
                "unknown topology '{name}'; known topologies: [{}]",
                self.topology
            )));
        }
        let mut aabb = Aabb {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        };
        for point in &self.coordinates {
            for axis in 0..3 {
                aabb.min[axis] = aabb.min[axis].min(point[axis]);
                aabb.max[axis] = aabb.max[axis].max(point[axis]);
            }
        }
        Ok(aabb)
    }

    fn field_reduction(
        &self,
        stat: FieldStat,
        field: &str,
        component: Option<&str>,
    ) -> Result<FieldReduction> {
        let samples = self.column(field, component)?;
        let located = |winner: Option<reductions::IndexedValue<f64>>| -> Result<FieldReduction> {
            let winner = winner.ok_or_else(|| {
                Error::Collaborator(format!("field '{field}' has no samples"))
            })?;
            Ok(FieldReduction {
                value: winner.value,
                position: self.coordinates.get(winner.index).copied(),
                element: Some(ElementInfo {
                    rank: 0,
                    domain_index: 0,
                    index: winner.index as i64,
                    assoc: Association::Point,
                }),
            })
        };
        let plain = |value: f64| -> Result<FieldReduction> {
            Ok(FieldReduction {
                value,
                position: None,
                element: None,
            })
        };
        match stat {
            FieldStat::Min => located(reductions::min_indexed(&samples)),
            FieldStat::Max => located(reductions::max_indexed(&samples)),
            FieldStat::Sum => plain(reductions::sum(&samples)),
            FieldStat::Avg => plain(reductions::mean(&samples)),
            FieldStat::NanCount => plain(samples.iter().filter(|v| v.is_nan()).count() as f64),
            FieldStat::InfCount => plain(samples.iter().filter(|v| v.is_infinite()).count() as f64),
        }
    }

    fn field_histogram(
        &self,
        field: &str,
        min_val: f64,
        max_val: f64,
        num_bins: usize,
    ) -> Result<Vec<f64>> {
        let samples = self.column(field, None)?;
        Ok(stats::bucket_counts(&samples, min_val, max_val, num_bins, true))
    }

    fn binning(&self, request: &BinningRequest) -> Result<BinningOutput> {
        let columns = request
            .axes
            .iter()
            .map(|axis| self.column(&axis.name, None))
            .collect::<Result<Vec<_>>>()?;
        let var = if request.reduction_var.is_empty() {
            None
        } else {
            Some(self.column(&request.reduction_var, request.component.as_deref())?)
        };
        let values = binning::accumulate(
            &request.axes,
            &columns,
            var.as_deref(),
            request.reduction_op,
            request.empty_bin_val,
        );
        Ok(BinningOutput {
            values,
            association: Association::Point,
        })
    }

    /// Nearest-point sampling along the segment.
    fn lineout(&self, request: &LineoutRequest) -> Result<Lineout> {
        let steps = request.num_samples.max(1);
        let coordinates: Vec<[f64; 3]> = (0..steps)
            .map(|i| {
                let t = if steps == 1 {
                    0.0
                } else {
                    i as f64 / (steps - 1) as f64
                };
                [0, 1, 2].map(|a| request.start[a] + t * (request.end[a] - request.start[a]))
            })
            .collect();

        let mut vars = IndexMap::new();
        for field in &request.fields {
            let column = self.column(field, None)?;
            let sampled = coordinates
                .iter()
                .map(|p| {
                    nearest_point(&self.coordinates, p)
                        .and_then(|i| column.get(i).copied())
                        .unwrap_or(request.empty_value)
                })
                .collect();
            vars.insert(field.clone(), sampled);
        }
        Ok(Lineout {
            empty_value: request.empty_value,
            coordinates,
            vars,
        })
    }
}

fn nearest_point(points: &[[f64; 3]], target: &[f64; 3]) -> Option<usize> {
    let distances: Vec<f64> = points
        .iter()
        .map(|p| (0..3).map(|a| (p[a] - target[a]).powi(2)).sum())
        .collect();
    reductions::min_indexed(&distances).map(|iv| iv.index)
}
