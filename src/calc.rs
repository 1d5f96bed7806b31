//! Registry of named calculations applied to input variables.
//!
//! A mapping may combine several raw inputs into one output field. The
//! registry binds each calculation identifier to a typed entry so that
//! an unknown identifier is rejected when the job is validated, before
//! any file is opened. The entry also declares which axes the
//! calculation collapses, which drives cell-bounds recomputation.

use crate::error::{ClimopError, Result};
use ndarray::{ArrayD, Axis};
use std::collections::BTreeMap;

/// One registered calculation.
#[derive(Debug)]
pub struct CalcEntry {
    pub id: &'static str,
    /// Axis names (substring match) this calculation collapses.
    pub reduces: &'static [&'static str],
    /// True when model levels are reinterpreted as height levels.
    pub level_interp: bool,
    pub apply: fn(&[ArrayD<f64>]) -> Result<ArrayD<f64>>,
}

/// Identifier-to-entry table of the built-in calculations.
#[derive(Debug)]
pub struct CalcRegistry {
    entries: BTreeMap<&'static str, CalcEntry>,
}

impl CalcRegistry {
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();
        for entry in [
            CalcEntry {
                id: "sum_vars",
                reduces: &[],
                level_interp: false,
                apply: sum_vars,
            },
            CalcEntry {
                id: "depth_integral",
                reduces: &["depth", "st_ocean", "sw_ocean", "lev"],
                level_interp: false,
                apply: depth_integral,
            },
            CalcEntry {
                id: "level_to_height",
                reduces: &[],
                level_interp: true,
                apply: first_input,
            },
        ] {
            entries.insert(entry.id, entry);
        }
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Result<&CalcEntry> {
        self.entries
            .get(id)
            .ok_or_else(|| ClimopError::UnknownCalculation(id.to_string()))
    }

    /// Check an identifier before any file is touched. An empty string
    /// means a plain copy and is always valid.
    pub fn validate(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Ok(());
        }
        self.get(id).map(|_| ())
    }
}

fn same_shapes(inputs: &[ArrayD<f64>]) -> Result<()> {
    let Some(first) = inputs.first() else {
        return Err(ClimopError::DataAvailability("calculation got no inputs".into()));
    };
    if inputs.iter().any(|a| a.shape() != first.shape()) {
        return Err(ClimopError::DataAvailability(
            "calculation inputs have mismatched shapes".into(),
        ));
    }
    Ok(())
}

/// Elementwise sum of all inputs.
fn sum_vars(inputs: &[ArrayD<f64>]) -> Result<ArrayD<f64>> {
    same_shapes(inputs)?;
    let mut out = inputs[0].clone();
    for a in &inputs[1..] {
        out += a;
    }
    Ok(out)
}

/// Column sum over the vertical axis, conventionally the second
/// dimension of a (time, depth, ...) field.
fn depth_integral(inputs: &[ArrayD<f64>]) -> Result<ArrayD<f64>> {
    same_shapes(inputs)?;
    let field = &inputs[0];
    if field.ndim() < 2 {
        return Err(ClimopError::DataAvailability(
            "depth integral needs a vertical dimension".into(),
        ));
    }
    Ok(field.sum_axis(Axis(1)))
}

/// Values pass through unchanged; the vertical axis is relabelled by
/// the naming step.
fn first_input(inputs: &[ArrayD<f64>]) -> Result<ArrayD<f64>> {
    same_shapes(inputs)?;
    Ok(inputs[0].clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    fn arr(shape: &[usize], fill: f64) -> ArrayD<f64> {
        ArrayD::from_elem(IxDyn(shape), fill)
    }

    #[test]
    fn unknown_identifier_rejected_at_validation() {
        let reg = CalcRegistry::builtin();
        assert!(reg.validate("").is_ok());
        assert!(reg.validate("sum_vars").is_ok());
        assert!(matches!(
            reg.validate("plev19_interp"),
            Err(ClimopError::UnknownCalculation(_))
        ));
    }

    #[test]
    fn sum_adds_elementwise() {
        let reg = CalcRegistry::builtin();
        let entry = reg.get("sum_vars").unwrap();
        let out = (entry.apply)(&[arr(&[2, 3], 1.0), arr(&[2, 3], 2.5)]).unwrap();
        assert_eq!(out[[0, 0]], 3.5);
    }

    #[test]
    fn mismatched_shapes_are_an_error() {
        let reg = CalcRegistry::builtin();
        let entry = reg.get("sum_vars").unwrap();
        assert!((entry.apply)(&[arr(&[2, 3], 1.0), arr(&[3, 2], 1.0)]).is_err());
    }

    #[test]
    fn depth_integral_collapses_vertical_axis() {
        let reg = CalcRegistry::builtin();
        let entry = reg.get("depth_integral").unwrap();
        let out = (entry.apply)(&[arr(&[2, 4, 3], 1.0)]).unwrap();
        assert_eq!(out.shape(), &[2, 3]);
        assert_eq!(out[[0, 0]], 4.0);
        assert!(entry.reduces.contains(&"st_ocean"));
    }
}
