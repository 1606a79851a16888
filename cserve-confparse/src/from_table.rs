use crate::table::TableValue;
use std::collections::HashMap;
use std::fmt;

/// Converts a parsed [`TableValue`] into a concrete Rust type, the
/// config-script analogue of the reference server's `FromYaml` trait.
pub trait FromTable: Sized {
    fn from_table(value: &TableValue) -> Result<Self, ConvertError>;
}

#[derive(Debug)]
pub struct ConvertError {
    pub message: String,
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ConvertError {}

impl ConvertError {
    fn new(message: impl Into<String>) -> Self {
        ConvertError {
            message: message.into(),
        }
    }
}

impl FromTable for String {
    fn from_table(value: &TableValue) -> Result<Self, ConvertError> {
        value
            .as_scalar()
            .map(|s| s.to_string())
            .ok_or_else(|| ConvertError::new("expected a scalar string"))
    }
}

impl FromTable for bool {
    fn from_table(value: &TableValue) -> Result<Self, ConvertError> {
        match value.as_scalar() {
            Some("true") | Some("yes") | Some("on") => Ok(true),
            Some("false") | Some("no") | Some("off") => Ok(false),
            other => Err(ConvertError::new(format!("expected a boolean, found {other:?}"))),
        }
    }
}

macro_rules! impl_from_table_numeric {
    ($($t:ty),*) => {
        $(
            impl FromTable for $t {
                fn from_table(value: &TableValue) -> Result<Self, ConvertError> {
                    value
                        .as_scalar()
                        .ok_or_else(|| ConvertError::new("expected a numeric scalar"))?
                        .parse::<$t>()
                        .map_err(|e| ConvertError::new(format!("invalid number: {e}")))
                }
            }
        )*
    };
}

impl_from_table_numeric!(i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64);

impl<T: FromTable> FromTable for Vec<T> {
    fn from_table(value: &TableValue) -> Result<Self, ConvertError> {
        let items = value
            .as_list()
            .ok_or_else(|| ConvertError::new("expected a list"))?;
        items.iter().map(T::from_table).collect()
    }
}

impl<T: FromTable> FromTable for Option<T> {
    fn from_table(value: &TableValue) -> Result<Self, ConvertError> {
        Ok(Some(T::from_table(value)?))
    }
}

impl<T: FromTable> FromTable for HashMap<String, T> {
    fn from_table(value: &TableValue) -> Result<Self, ConvertError> {
        let map = value
            .as_map()
            .ok_or_else(|| ConvertError::new("expected a mapping"))?;
        map.iter()
            .map(|(k, v)| Ok((k.clone(), T::from_table(v)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn converts_scalars_and_lists() {
        let doc = parse("port: 8080\ntags: [a, b]\n").unwrap();
        let port: u16 = u16::from_table(doc.get("port").unwrap()).unwrap();
        assert_eq!(port, 8080);
        let tags: Vec<String> = Vec::from_table(doc.get("tags").unwrap()).unwrap();
        assert_eq!(tags, vec!["a".to_string(), "b".to_string()]);
    }
}
