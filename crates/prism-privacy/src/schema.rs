use crate::error::{PrivacyError, Result};
use prism_dataset::ColumnQuantization;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const PAIR_SEPARATOR: char = '+';

/// Per-column quantizations and privacy budgets.
///
/// ```json
/// {
///   "quantization": { "age": { "granularity": 1, "globalMin": 0, "globalMax": 120 } },
///   "epsilons": { "age": 0.5, "age+income": 1.0 },
///   "defaultEpsilons": { "1": 0.1, "2": 0.2 }
/// }
/// ```
///
/// Epsilon keys name one column or an ordered pair joined by `+`; a pair is looked up in both
/// orders. `defaultEpsilons` is keyed by arity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacySchema {
    #[serde(default)]
    quantization: BTreeMap<String, ColumnQuantization>,
    #[serde(default)]
    epsilons: BTreeMap<String, f64>,
    #[serde(default)]
    default_epsilons: BTreeMap<String, f64>,
}

impl PrivacySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quantization(
        mut self,
        column: impl Into<String>,
        quantization: ColumnQuantization,
    ) -> Self {
        self.quantization.insert(column.into(), quantization);
        self
    }

    pub fn with_epsilon(mut self, column: impl Into<String>, epsilon: f64) -> Self {
        self.epsilons.insert(column.into(), epsilon);
        self
    }

    pub fn with_pair_epsilon(mut self, x: &str, y: &str, epsilon: f64) -> Self {
        self.epsilons.insert(pair_key(x, y), epsilon);
        self
    }

    /// Budget for any column (`arity == 1`) or pair (`arity == 2`) without its own entry.
    pub fn with_default_epsilon(mut self, arity: usize, epsilon: f64) -> Self {
        self.default_epsilons.insert(arity.to_string(), epsilon);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let parsed = serde_json::from_str::<Self>(json)
            .map_err(PrivacyError::from)
            .and_then(|schema| schema.validate().map(|()| schema));
        if let Err(err) = &parsed {
            log::warn!("rejected privacy schema: {err}");
        }
        parsed
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("loading privacy schema from {}", path.display());
        let json = std::fs::read_to_string(path).map_err(|err| {
            log::warn!("cannot read privacy schema {}: {err}", path.display());
            PrivacyError::Io(err)
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        for (column, quantization) in &self.quantization {
            quantization
                .validate()
                .map_err(|err| PrivacyError::InvalidQuantization {
                    column: column.clone(),
                    reason: err.to_string(),
                })?;
        }

        for (key, &epsilon) in &self.epsilons {
            check_epsilon(key, epsilon)?;
            let columns: Vec<&str> = key.split(PAIR_SEPARATOR).collect();
            if columns.len() > 2 || columns.iter().any(|c| c.is_empty()) {
                return Err(PrivacyError::MalformedKey(key.clone()));
            }
            for column in columns {
                if !self.quantization.contains_key(column) {
                    return Err(PrivacyError::MissingQuantization(column.to_string()));
                }
            }
        }

        for (arity, &epsilon) in &self.default_epsilons {
            if arity != "1" && arity != "2" {
                return Err(PrivacyError::MalformedKey(arity.clone()));
            }
            check_epsilon(arity, epsilon)?;
        }
        Ok(())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.quantization.keys().map(String::as_str)
    }

    pub fn quantization(&self, column: &str) -> Result<&ColumnQuantization> {
        self.quantization
            .get(column)
            .ok_or_else(|| PrivacyError::MissingQuantization(column.to_string()))
    }

    pub fn epsilon(&self, column: &str) -> Result<f64> {
        self.quantization(column)?;
        self.epsilons
            .get(column)
            .or_else(|| self.default_epsilons.get("1"))
            .copied()
            .ok_or_else(|| PrivacyError::NoEpsilon(column.to_string()))
    }

    pub fn epsilon_pair(&self, x: &str, y: &str) -> Result<f64> {
        self.quantization(x)?;
        self.quantization(y)?;
        let key = pair_key(x, y);
        self.epsilons
            .get(&key)
            .or_else(|| self.epsilons.get(&pair_key(y, x)))
            .or_else(|| self.default_epsilons.get("2"))
            .copied()
            .ok_or(PrivacyError::NoEpsilon(key))
    }
}

pub(crate) fn pair_key(x: &str, y: &str) -> String {
    format!("{x}{PAIR_SEPARATOR}{y}")
}

fn check_epsilon(key: &str, epsilon: f64) -> Result<()> {
    if epsilon.is_finite() && epsilon > 0.0 {
        Ok(())
    } else {
        Err(PrivacyError::InvalidEpsilon {
            key: key.to_string(),
            value: epsilon,
        })
    }
}
