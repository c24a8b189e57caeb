//! Job Parameter Contract
//!
//! Declared name/type pairs a job expects at launch. Values always arrive
//! as strings; the contract only checks that they parse as the declared
//! type, and steps read them back through the execution context.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{InvalidParametersError, ParameterProblem};

/// Format of `Date` parameters (`2024-05-01`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Declared type of a job parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    #[default]
    String,
    Long,
    Double,
    Date,
}

impl ParameterType {
    /// Whether `value` is a valid literal of this type.
    pub fn accepts(&self, value: &str) -> bool {
        let value = value.trim();
        match self {
            ParameterType::String => true,
            ParameterType::Long => value.parse::<i64>().is_ok(),
            ParameterType::Double => value.parse::<f64>().is_ok(),
            ParameterType::Date => NaiveDate::parse_from_str(value, DATE_FORMAT).is_ok(),
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterType::String => "string",
            ParameterType::Long => "long",
            ParameterType::Double => "double",
            ParameterType::Date => "date",
        };
        write!(f, "{}", name)
    }
}

fn default_required() -> bool {
    true
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,

    #[serde(rename = "type", default)]
    pub kind: ParameterType,

    /// Required parameters must be present at launch
    #[serde(default = "default_required")]
    pub required: bool,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>, kind: ParameterType) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParameterType) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }
}

/// Checks launch parameters against a job's declared contract.
///
/// Every problem is collected; undeclared parameters pass through.
pub fn validate_parameters(
    job: &str,
    specs: &[ParameterSpec],
    parameters: &HashMap<String, String>,
) -> Result<(), InvalidParametersError> {
    let mut problems = Vec::new();

    for spec in specs {
        match parameters.get(&spec.name) {
            None if spec.required => problems.push(ParameterProblem::Missing(spec.name.clone())),
            None => {}
            Some(value) if !spec.kind.accepts(value) => {
                problems.push(ParameterProblem::Mistyped {
                    name: spec.name.clone(),
                    expected: spec.kind.to_string(),
                    value: value.clone(),
                })
            }
            Some(_) => {}
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(InvalidParametersError {
            job: job.to_string(),
            problems,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn delivery_specs() -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("item", ParameterType::String),
            ParameterSpec::required("run.date", ParameterType::Date),
            ParameterSpec::optional("quantity", ParameterType::Long),
        ]
    }

    #[test]
    fn test_type_acceptance() {
        assert!(ParameterType::String.accepts("anything"));
        assert!(ParameterType::Long.accepts("42"));
        assert!(!ParameterType::Long.accepts("4.2"));
        assert!(ParameterType::Double.accepts("4.2"));
        assert!(ParameterType::Date.accepts("2024-02-29"));
        assert!(!ParameterType::Date.accepts("2023-02-29"));
        assert!(!ParameterType::Date.accepts("tomorrow"));
    }

    #[test]
    fn test_valid_parameters() {
        let p = params(&[("item", "shoes"), ("run.date", "2024-05-01")]);
        assert!(validate_parameters("job", &delivery_specs(), &p).is_ok());
    }

    #[test]
    fn test_missing_required_parameter() {
        let p = params(&[("run.date", "2024-05-01")]);
        let err = validate_parameters("job", &delivery_specs(), &p).unwrap_err();
        assert_eq!(err.problems, vec![ParameterProblem::Missing("item".to_string())]);
    }

    #[test]
    fn test_mistyped_parameters_collected() {
        let p = params(&[("item", "shoes"), ("run.date", "someday"), ("quantity", "many")]);
        let err = validate_parameters("job", &delivery_specs(), &p).unwrap_err();
        assert_eq!(err.problems.len(), 2);
        assert_eq!(err.job, "job");
    }

    #[test]
    fn test_optional_parameter_may_be_absent() {
        let p = params(&[("item", "shoes"), ("run.date", "2024-05-01")]);
        let specs = vec![ParameterSpec::optional("quantity", ParameterType::Long)];
        assert!(validate_parameters("job", &specs, &p).is_ok());
    }

    #[test]
    fn test_undeclared_parameters_pass_through() {
        let p = params(&[("extra", "value")]);
        assert!(validate_parameters("job", &[], &p).is_ok());
    }

    #[test]
    fn test_spec_deserialize_defaults() {
        let spec: ParameterSpec = serde_yaml::from_str("name: item").unwrap();
        assert_eq!(spec.kind, ParameterType::String);
        assert!(spec.required);

        let spec: ParameterSpec =
            serde_yaml::from_str("{ name: run.date, type: date, required: false }").unwrap();
        assert_eq!(spec.kind, ParameterType::Date);
        assert!(!spec.required);
    }
}
