//! Histogram construction and derived statistics.

use cadence_foundation::{Histogram, Value};
use tracing::debug;

use crate::context::EvalContext;
use crate::error::{Error, Result};
use crate::filter::{Filter, Inputs, Output, Port};
use crate::mesh::FieldStat;
use crate::stats::{self, Interpolation};

pub(crate) fn histogram_input<'a>(inputs: &Inputs<'a>, port: &str) -> Result<&'a Histogram> {
    let value = inputs.required(port)?;
    match value {
        Value::Histogram(h) => Ok(h),
        other => Err(inputs.mismatch(port, "histogram", other)),
    }
}

/// Uniform histogram of a scalar field.
///
/// Missing bounds default to the field's global min and max; a missing bin
/// count defaults to the session's `default_num_bins`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramNode;

impl Filter for HistogramNode {
    fn type_name(&self) -> &'static str {
        "histogram"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::required("arg1"),
            Port::optional("num_bins"),
            Port::optional("min_val"),
            Port::optional("max_val"),
        ]
    }

    fn execute(&self, inputs: &Inputs<'_>, ctx: &mut EvalContext<'_>) -> Result<Output> {
        let node = inputs.node();
        let (field, component) = inputs.required_field("arg1")?;
        if let Some(component) = component {
            return Err(Error::ComponentMismatch {
                node: node.to_string(),
                message: format!(
                    "histograms take a whole field; component '{component}' of '{field}' was given"
                ),
            });
        }
        let num_bins = match inputs.int("num_bins")? {
            Some(n) if n < 1 => {
                return Err(Error::invalid_argument(
                    node,
                    format!("num_bins must be at least 1, got {n}"),
                ));
            }
            Some(n) => n as usize,
            None => ctx.config.default_num_bins,
        };
        let min_val = inputs.double("min_val")?;
        let max_val = inputs.double("max_val")?;
        if let (Some(min), Some(max)) = (min_val, max_val)
            && !(min < max)
        {
            return Err(Error::InvalidRange {
                node: node.to_string(),
                min,
                max,
            });
        }

        if !ctx.mesh.has_field(field) {
            return Err(Error::UnknownField {
                node: node.to_string(),
                field: field.to_string(),
                known: ctx.mesh.field_names(),
            });
        }
        let min_val = match min_val {
            Some(v) => v,
            None => ctx.mesh.field_reduction(FieldStat::Min, field, None)?.value,
        };
        let max_val = match max_val {
            Some(v) => v,
            None => ctx.mesh.field_reduction(FieldStat::Max, field, None)?.value,
        };
        if !(min_val < max_val) {
            return Err(Error::InvalidRange {
                node: node.to_string(),
                min: min_val,
                max: max_val,
            });
        }

        let values = ctx.mesh.field_histogram(field, min_val, max_val, num_bins)?;
        if values.len() != num_bins {
            return Err(Error::Collaborator(format!(
                "histogram of '{field}' returned {} bins, expected {num_bins}",
                values.len()
            )));
        }
        debug!(node, field, num_bins, min_val, max_val, "histogram built");
        Ok(Value::Histogram(Histogram {
            values,
            min_val,
            max_val,
            clamp: true,
        })
        .into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Pdf,
    Cdf,
    Entropy,
}

/// `pdf`, `cdf` and `entropy` of a histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramTransform {
    transform: Transform,
}

impl HistogramTransform {
    pub fn new(transform: Transform) -> Self {
        Self { transform }
    }
}

impl Filter for HistogramTransform {
    fn type_name(&self) -> &'static str {
        match self.transform {
            Transform::Pdf => "pdf",
            Transform::Cdf => "cdf",
            Transform::Entropy => "entropy",
        }
    }

    fn ports(&self) -> Vec<Port> {
        vec![Port::required("hist")]
    }

    fn execute(&self, inputs: &Inputs<'_>, _ctx: &mut EvalContext<'_>) -> Result<Output> {
        let hist = histogram_input(inputs, "hist")?;
        let value = match self.transform {
            Transform::Pdf => Value::Histogram(stats::pdf(hist)),
            Transform::Cdf => Value::Histogram(stats::cdf(hist)),
            Transform::Entropy => Value::Double(stats::entropy(hist)),
        };
        Ok(value.into())
    }
}

/// Value at cumulative probability `q` of a CDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantileNode;

impl Filter for QuantileNode {
    fn type_name(&self) -> &'static str {
        "quantile"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::required("cdf"),
            Port::required("q"),
            Port::optional("interpolation"),
        ]
    }

    fn execute(&self, inputs: &Inputs<'_>, _ctx: &mut EvalContext<'_>) -> Result<Output> {
        let cdf = histogram_input(inputs, "cdf")?;
        let q = inputs.required_double("q")?;
        let interpolation = match inputs.string("interpolation")? {
            Some(name) => Interpolation::parse(inputs.node(), name)?,
            None => Interpolation::Linear,
        };
        let value = stats::quantile(inputs.node(), cdf, q, interpolation)?;
        Ok(Value::Double(value).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::PointMesh;
    use crate::nodes::testing::Bench;

    fn bench() -> Bench {
        let mesh = PointMesh::new(0, None, vec![[0.0; 3]; 4])
            .with_scalar("energy", vec![1.0, 3.0, 5.0, 7.0])
            .with_components("velocity", [("u", vec![0.0; 4])]);
        Bench::new().with_mesh(mesh)
    }

    fn field(name: &str) -> Value {
        Value::Field {
            name: name.to_string(),
            component: None,
        }
    }

    fn histogram(bench: &mut Bench) -> Value {
        bench
            .run(
                &HistogramNode,
                &[
                    ("arg1", field("energy")),
                    ("num_bins", Value::Int(4)),
                    ("min_val", Value::Double(0.0)),
                    ("max_val", Value::Int(8)),
                ],
            )
            .expect("histogram")
    }

    #[test]
    fn histogram_counts_and_median() {
        let mut bench = bench();
        let hist = histogram(&mut bench);
        let Value::Histogram(h) = &hist else {
            panic!("expected histogram, got {hist}");
        };
        assert_eq!(h.values, vec![1.0, 1.0, 1.0, 1.0]);

        let cdf = bench
            .run(&HistogramTransform::new(Transform::Cdf), &[("hist", hist.clone())])
            .expect("cdf");
        let median = bench
            .run(
                &QuantileNode,
                &[("cdf", cdf.clone()), ("q", Value::Double(0.5)), ("interpolation", Value::from("linear"))],
            )
            .expect("quantile");
        assert_eq!(median, Value::Double(4.0));

        assert!(matches!(
            bench.run(&QuantileNode, &[("cdf", cdf.clone()), ("q", Value::Double(-0.1))]),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            bench.run(
                &QuantileNode,
                &[("cdf", cdf), ("q", Value::Double(0.5)), ("interpolation", Value::from("spline"))]
            ),
            Err(Error::Validation { .. })
        ));

        let entropy = bench
            .run(&HistogramTransform::new(Transform::Entropy), &[("hist", hist)])
            .expect("entropy");
        let expected = 4.0f64.ln();
        assert!(entropy.as_double().is_some_and(|e| (e - expected).abs() < 1e-12));
    }

    #[test]
    fn bounds_default_to_field_range() {
        let mut bench = bench();
        let hist = bench
            .run(&HistogramNode, &[("arg1", field("energy")), ("num_bins", Value::Int(3))])
            .expect("histogram");
        let Value::Histogram(h) = hist else {
            panic!("expected histogram");
        };
        assert_eq!((h.min_val, h.max_val), (1.0, 7.0));
        assert_eq!(h.values, vec![1.0, 1.0, 2.0]);
        assert!(h.clamp);

        bench.config.default_num_bins = 2;
        let hist = bench
            .run(&HistogramNode, &[("arg1", field("energy"))])
            .expect("default bins");
        assert_eq!(hist.attr("num_bins"), Some(Value::Int(2)));
    }

    #[test]
    fn histogram_validation() {
        let mut bench = bench();
        assert!(matches!(
            bench.run(
                &HistogramNode,
                &[
                    ("arg1", field("energy")),
                    ("min_val", Value::Double(2.0)),
                    ("max_val", Value::Double(2.0)),
                ]
            ),
            Err(Error::InvalidRange { .. })
        ));
        assert!(matches!(
            bench.run(&HistogramNode, &[("arg1", field("pressure"))]),
            Err(Error::UnknownField { .. })
        ));
        assert!(matches!(
            bench.run(
                &HistogramNode,
                &[("arg1", field("energy")), ("num_bins", Value::Int(0))]
            ),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            bench.run(&HistogramTransform::new(Transform::Pdf), &[("hist", Value::Int(1))]),
            Err(Error::TypeMismatch { .. })
        ));
    }
}
