//! TOML-backed parameter structs: start from defaults, then overlay whatever
//! fields a config string names.

use crate::utils::BenchError;

use serde::de::DeserializeOwned;

use toml::Table;

/// Parses an optional TOML config string into a table. A missing or blank
/// string yields an empty table.
pub(crate) fn config_table(config_str: Option<&str>) -> Result<Table, BenchError> {
    match config_str {
        Some(s) if !s.trim().is_empty() => Ok(s.parse::<Table>()?),
        _ => Ok(Table::new()),
    }
}

/// Removes `field` from the table and converts its value, if present.
pub(crate) fn take_field<T: DeserializeOwned>(
    table: &mut Table,
    field: &str,
) -> Result<Option<T>, BenchError> {
    table
        .remove(field)
        .map(|value| {
            value.try_into().map_err(|e| {
                BenchError::msg(format!("invalid value for '{}': {}", field, e))
            })
        })
        .transpose()
}

/// Fails if the table still holds keys that no field claimed.
pub(crate) fn reject_leftovers(table: &Table, type_name: &str) -> Result<(), BenchError> {
    if table.is_empty() {
        return Ok(());
    }
    let mut keys: Vec<&str> = table.keys().map(String::as_str).collect();
    keys.sort_unstable();
    Err(BenchError::msg(format!(
        "unknown field(s) {} for {}",
        keys.join(", "),
        type_name
    )))
}

/// Builds a `$config_type` from its `Default`, overwriting each listed field
/// found in the optional TOML string. Keys outside the list are an error.
///
/// Example:
/// ```ignore
/// let params = parsed_config!(params_str => RunParams; batch_size, duration_s)?;
/// ```
#[macro_export]
macro_rules! parsed_config {
    ($config_str:expr => $config_type:ty; $($field:ident),+) => {
        (|| -> Result<$config_type, $crate::BenchError> {
            let mut table = $crate::utils::config_table($config_str)?;
            let mut config = <$config_type>::default();
            $(
                if let Some(value) =
                    $crate::utils::take_field(&mut table, stringify!($field))?
                {
                    config.$field = value;
                }
            )+
            $crate::utils::reject_leftovers(&table, stringify!($config_type))?;
            Ok(config)
        })()
    };
}
