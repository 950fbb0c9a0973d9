use std::{env, str::FromStr};

use thiserror::Error as ThisError;

#[derive(Debug, Clone, Eq, PartialEq, ThisError)]
pub enum ConfigError {
    #[error("{name} environment variable is not defined")]
    Missing { name: String },
    #[error("{name} environment variable failed to parse value={value} with error {reason}")]
    Parse { name: String, value: String, reason: String },
}

pub trait EnvVarFromStr: Sized {
    fn from_env_var_str(name: &str, v: &str) -> Result<Self, ConfigError>;
}

macro_rules! from_str_env_var_types {
  ($type: ty) => {
    impl EnvVarFromStr for $type {
      fn from_env_var_str(name: &str, v: &str) -> Result<Self, ConfigError> {
        <$type>::from_str(v.trim()).map_err(|e| ConfigError::Parse {
          name: name.to_string(),
          value: v.to_string(),
          reason: e.to_string(),
        })
      }
    }
  };

  ($($type: ty),+) => {
    $( from_str_env_var_types!( $type ); )+
  };
}

from_str_env_var_types!(u16, u32, u64, usize, i32, bool);

impl EnvVarFromStr for String {
    fn from_env_var_str(_name: &str, v: &str) -> Result<Self, ConfigError> {
        Ok(v.to_string())
    }
}

/// Reads a mandatory variable. Missing or unparsable values are errors.
pub fn read_var<T: EnvVarFromStr>(name: &str) -> Result<T, ConfigError> {
    let v = env::var(name).map_err(|_| ConfigError::Missing { name: name.to_string() })?;
    T::from_env_var_str(name, &v)
}

/// Reads a variable falling back to `default` when it is not set or blank.
pub fn read_var_or<T: EnvVarFromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    Ok(read_var_optional(name)?.unwrap_or(default))
}

/// Reads a variable which is allowed to be absent. Blank values are treated as absent.
pub fn read_var_optional<T: EnvVarFromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => T::from_env_var_str(name, &v).map(Some),
        _ => Ok(None),
    }
}

#[macro_export]
macro_rules! env_var {
    ($name: expr) => {
        $crate::env::read_var::<String>(&$name)
    };
    ($name: expr, $type: ty) => {
        $crate::env::read_var::<$type>(&$name)
    };
}

#[macro_export]
macro_rules! env_var_with_defaults {
    ($name: expr, $type: ty) => {
        $crate::env::read_var_optional::<$type>(&$name)
    };
    ($name: expr, $type: ty, $default: expr) => {
        $crate::env::read_var_or::<$type>(&$name, $default)
    };
}
