//! Reduction binning and bin lookup.
//!
//! # Binning
//!
//! [`binning`] validates a request against the dataset, resolves open axis
//! bounds from the field ranges, delegates the reduction to the mesh
//! collaborator, and wraps the answer with its metadata. The output holds one
//! value per bin of the Cartesian product of all axes, flattened with the
//! first axis varying fastest.
//!
//! # Lookup
//!
//! The lookup and search helpers work on single-axis binnings (and on
//! histograms, which are single-axis by construction). Multi-axis lookup is
//! reported as [`Error::NotImplemented`].

use cadence_foundation::{
    Axis, AxisSpec, Bin, BinReduction, Binning, ValuePosition,
};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::mesh::{BinningRequest, FieldStat, MeshStatistics, coordinate_axis};
use crate::reductions;

/// Checks the reduction variable and its component selection.
pub fn validate_reduction_var(
    node: &str,
    mesh: &dyn MeshStatistics,
    reduction_var: &str,
    reduction_op: BinReduction,
    component: Option<&str>,
) -> Result<()> {
    if reduction_var.is_empty() {
        if !reduction_op.is_count_like() {
            return Err(Error::validation(
                node,
                format!(
                    "reduction_var can only be left empty when reduction_op is 'count' or 'pdf', not '{}'",
                    reduction_op.as_str()
                ),
            ));
        }
        return Ok(());
    }
    if coordinate_axis(reduction_var).is_some() && !mesh.has_field(reduction_var) {
        return Ok(());
    }
    if !mesh.has_field(reduction_var) {
        return Err(Error::UnknownField {
            node: node.to_string(),
            field: reduction_var.to_string(),
            known: mesh.field_names(),
        });
    }
    let scalar = mesh.is_scalar_field(reduction_var);
    match (scalar, component) {
        (false, None) => Err(Error::ComponentMismatch {
            node: node.to_string(),
            message: format!(
                "reduction variable '{reduction_var}' has multiple components and no component was given; known components: {:?}",
                mesh.possible_components(reduction_var)
            ),
        }),
        (true, Some(c)) => Err(Error::ComponentMismatch {
            node: node.to_string(),
            message: format!(
                "reduction variable '{reduction_var}' is scalar but component '{c}' was given"
            ),
        }),
        (false, Some(c)) if !mesh.has_component(reduction_var, c) => {
            Err(Error::ComponentMismatch {
                node: node.to_string(),
                message: format!(
                    "reduction variable '{reduction_var}' has no component '{c}'; known components: {:?}",
                    mesh.possible_components(reduction_var)
                ),
            })
        }
        _ => Ok(()),
    }
}

/// Axis names must be `x`/`y`/`z` or a scalar field.
pub fn validate_axis_name(node: &str, mesh: &dyn MeshStatistics, name: &str) -> Result<()> {
    if coordinate_axis(name).is_some() && !mesh.has_field(name) {
        return Ok(());
    }
    if !mesh.has_field(name) {
        return Err(Error::UnknownField {
            node: node.to_string(),
            field: name.to_string(),
            known: mesh.field_names(),
        });
    }
    if !mesh.is_scalar_field(name) {
        return Err(Error::ComponentMismatch {
            node: node.to_string(),
            message: format!("axis '{name}' must be a scalar field or one of x, y, z"),
        });
    }
    Ok(())
}

/// Data range of an axis variable, used to close open uniform bounds.
fn data_range(node: &str, mesh: &dyn MeshStatistics, name: &str) -> Result<(f64, f64)> {
    if let Some(axis) = coordinate_axis(name)
        && !mesh.has_field(name)
    {
        let aabb = mesh.bounds(None)?;
        return Ok((aabb.min[axis], aabb.max[axis]));
    }
    let min = mesh.field_reduction(FieldStat::Min, name, None)?.value;
    let max = mesh.field_reduction(FieldStat::Max, name, None)?.value;
    debug!(node, axis = name, min, max, "axis bounds taken from data");
    Ok((min, max))
}

/// Validates and resolves every axis of `specs`.
pub fn resolve_axes(
    node: &str,
    mesh: &dyn MeshStatistics,
    specs: &[AxisSpec],
    default_num_bins: usize,
) -> Result<Vec<Axis>> {
    if specs.is_empty() {
        return Err(Error::validation(node, "bin_axes must contain at least one axis"));
    }
    specs
        .iter()
        .map(|spec| {
            spec.validate().map_err(|e| Error::axis(node, e))?;
            validate_axis_name(node, mesh, &spec.name)?;
            let range = if spec.needs_data_range() {
                Some(data_range(node, mesh, &spec.name)?)
            } else {
                None
            };
            spec.resolve(default_num_bins, range)
                .map_err(|e| Error::axis(node, e))
        })
        .collect()
}

/// Parameters of a `binning` evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct BinningParams {
    pub reduction_var: String,
    pub reduction_op: BinReduction,
    pub axes: Vec<AxisSpec>,
    pub empty_bin_val: f64,
    pub component: Option<String>,
}

/// Full `binning` evaluation: validation, axis resolution, delegation.
pub fn binning(
    node: &str,
    mesh: &dyn MeshStatistics,
    params: BinningParams,
    default_num_bins: usize,
) -> Result<Binning> {
    validate_reduction_var(
        node,
        mesh,
        &params.reduction_var,
        params.reduction_op,
        params.component.as_deref(),
    )?;
    let axes = resolve_axes(node, mesh, &params.axes, default_num_bins)?;
    let expected: usize = axes.iter().map(Axis::num_bins).product();

    let request = BinningRequest {
        reduction_var: params.reduction_var,
        component: params.component,
        reduction_op: params.reduction_op,
        axes,
        empty_bin_val: params.empty_bin_val,
    };
    let output = mesh.binning(&request)?;
    if output.values.len() != expected {
        return Err(Error::Collaborator(format!(
            "binning returned {} bins, expected {expected}",
            output.values.len()
        )));
    }
    debug!(node, bins = expected, op = request.reduction_op.as_str(), "binning complete");

    Ok(Binning {
        values: output.values,
        association: output.association,
        reduction_var: request.reduction_var,
        reduction_op: request.reduction_op,
        axes: request.axes,
    })
}

/// Reduces per-sample values into bins.
///
/// `columns[a][i]` is sample `i`'s coordinate along `axes[a]`; `var` holds
/// the reduced values (absent for count-like reductions). Samples falling
/// outside a non-clamping axis are skipped.
pub fn accumulate(
    axes: &[Axis],
    columns: &[Vec<f64>],
    var: Option<&[f64]>,
    op: BinReduction,
    empty_bin_val: f64,
) -> Vec<f64> {
    let total_bins: usize = axes.iter().map(Axis::num_bins).product();
    let mut samples: Vec<Vec<f64>> = vec![Vec::new(); total_bins];
    let num_samples = columns.iter().map(Vec::len).min().unwrap_or(0);

    'samples: for i in 0..num_samples {
        let mut flat = 0;
        let mut stride = 1;
        for (axis, column) in axes.iter().zip(columns) {
            let Some(bin) = axis.locate_sample(column[i]) else {
                continue 'samples;
            };
            flat += bin * stride;
            stride *= axis.num_bins();
        }
        let value = var.and_then(|v| v.get(i).copied()).unwrap_or(1.0);
        samples[flat].push(value);
    }

    let binned: usize = samples.iter().map(Vec::len).sum();
    samples
        .iter()
        .map(|bin| match (op, reductions::reduce_bin(op, bin)) {
            (BinReduction::Pdf, Some(count)) => count / binned as f64,
            (_, Some(v)) => v,
            (_, None) => empty_bin_val,
        })
        .collect()
}

/// The only axis of a single-axis binning.
pub fn single_axis<'a>(node: &str, axes: &'a [Axis]) -> Result<&'a Axis> {
    match axes {
        [axis] => Ok(axis),
        _ => Err(Error::not_implemented(
            node,
            format!("lookups on binnings with {} axes; only one axis is supported", axes.len()),
        )),
    }
}

fn make_bin(values: &[f64], axis: &Axis, index: usize) -> Option<Bin> {
    let (min, max) = axis.bin_bounds(index)?;
    Some(Bin {
        index: Some(index),
        value: *values.get(index)?,
        min,
        max,
        center: min + (max - min) / 2.0,
    })
}

/// Bin `index` of a single-axis binning.
pub fn bin_by_index(node: &str, values: &[f64], axes: &[Axis], index: i64) -> Result<Bin> {
    let axis = single_axis(node, axes)?;
    let out_of_range = || Error::IndexOutOfRange {
        node: node.to_string(),
        index,
        len: axis.num_bins(),
    };
    if index < 0 {
        return Err(out_of_range());
    }
    make_bin(values, axis, index as usize).ok_or_else(out_of_range)
}

/// The bin of a single-axis binning containing `v`.
pub fn bin_by_value(node: &str, values: &[f64], axes: &[Axis], v: f64) -> Result<Bin> {
    let axis = single_axis(node, axes)?;
    let index = axis.locate(v).ok_or_else(|| {
        Error::invalid_argument(
            node,
            format!(
                "value {v} lies outside the axis range [{}, {}]",
                axis.min_val(),
                axis.max_val()
            ),
        )
    })?;
    make_bin(values, axis, index).ok_or_else(|| Error::IndexOutOfRange {
        node: node.to_string(),
        index: index as i64,
        len: values.len(),
    })
}

/// Nearest bin above `threshold` on the `direction` side of `point`.
///
/// Bins whose center lies behind `point` (relative to `direction`) are
/// skipped; among the rest the smallest center distance wins, lowest index
/// first on ties. With no qualifying bin every field of the result is
/// `miss_value`.
pub fn point_and_axis(
    node: &str,
    values: &[f64],
    axes: &[Axis],
    threshold: f64,
    point: f64,
    direction: i64,
    miss_value: f64,
) -> Result<Bin> {
    let axis = single_axis(node, axes)?;
    if direction != 1 && direction != -1 {
        return Err(Error::invalid_argument(
            node,
            format!("invalid direction {direction}; valid directions are 1 or -1"),
        ));
    }
    let mut best: Option<(usize, f64)> = None;
    for (i, value) in values.iter().enumerate().take(axis.num_bins()) {
        if !(*value > threshold) {
            continue;
        }
        let Some(center) = axis.center(i) else {
            continue;
        };
        let dist = center - point;
        if dist * (direction as f64) < 0.0 {
            continue;
        }
        if best.is_none_or(|(_, d)| dist.abs() < d) {
            best = Some((i, dist.abs()));
        }
    }
    match best.and_then(|(i, _)| make_bin(values, axis, i)) {
        Some(bin) => Ok(bin),
        None => {
            warn!(node, threshold, point, direction, "no bin qualifies; returning miss value");
            Ok(Bin {
                index: None,
                value: miss_value,
                min: miss_value,
                max: miss_value,
                center: miss_value,
            })
        }
    }
}

/// Maximum bin value, ties broken by the center nearest to `point`.
/// NaN bins are ignored unless every bin is NaN.
///
/// The returned position is zero except along `axis_name` (`x`, `y` or `z`,
/// defaulting to `x`), where it holds the signed offset `center - point`.
pub fn max_from_point(
    node: &str,
    values: &[f64],
    axes: &[Axis],
    axis_name: &str,
    point: f64,
) -> Result<ValuePosition> {
    let axis = single_axis(node, axes)?;
    let mut best: Option<(f64, f64, f64)> = None;
    for (i, value) in values.iter().enumerate().take(axis.num_bins()) {
        let Some(center) = axis.center(i) else {
            continue;
        };
        let offset = center - point;
        let better = match best {
            None => true,
            Some((best_value, best_offset, _)) => {
                (best_value.is_nan() && !value.is_nan())
                    || *value > best_value
                    || (*value == best_value && offset.abs() < best_offset.abs())
            }
        };
        if better {
            best = Some((*value, offset, center));
        }
    }
    let (value, offset, _) = best.ok_or_else(|| {
        Error::invalid_argument(node, "cannot search an empty binning")
    })?;
    let mut position = [0.0; 3];
    position[coordinate_axis(axis_name).unwrap_or(0)] = offset;
    Ok(ValuePosition {
        value,
        position,
        element: None,
    })
}
