use indexmap::IndexMap;
use std::{fmt, str::FromStr};

use crate::errors::CodesError;

/// Projection described by a PROJ string, eg. `+proj=eqc +ellps=WGS84 +no_defs`.
///
/// Parameters keep their order; flags such as `+no_defs` have no value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Projection {
    params: IndexMap<String, Option<String>>,
}

impl Projection {
    /// # Errors
    ///
    /// Returns [`CodesError::InvalidProjection`] when a parameter does not start with `+`
    /// or the string has no parameters.
    pub fn from_proj_string(text: &str) -> Result<Self, CodesError> {
        let mut params = IndexMap::new();

        for token in text.split_whitespace() {
            let Some(param) = token.strip_prefix('+') else {
                return Err(CodesError::InvalidProjection(text.to_owned()));
            };

            match param.split_once('=') {
                Some((name, value)) => params.insert(name.to_owned(), Some(value.to_owned())),
                None => params.insert(param.to_owned(), None),
            };
        }

        if params.is_empty() {
            return Err(CodesError::InvalidProjection(text.to_owned()));
        }

        Ok(Self { params })
    }

    /// Name of the projection method, the `proj` parameter.
    pub fn name(&self) -> Option<&str> {
        self.get("proj")
    }

    pub fn get(&self, param: &str) -> Option<&str> {
        self.params.get(param).and_then(Option::as_deref)
    }

    pub fn has_flag(&self, param: &str) -> bool {
        self.params.contains_key(param)
    }

    /// Numeric value of a parameter, `None` when absent or not a number.
    pub fn get_f64(&self, param: &str) -> Option<f64> {
        self.get(param).and_then(|v| v.parse().ok())
    }

    pub fn to_proj_string(&self) -> String {
        self.to_string()
    }
}

impl FromStr for Projection {
    type Err = CodesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_proj_string(s)
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match value {
                Some(value) => write!(f, "+{name}={value}")?,
                None => write!(f, "+{name}")?,
            }
        }
        Ok(())
    }
}
