use std::collections::BTreeMap;

/// A parsed config-script value. Maps use `BTreeMap` so serialized output
/// (and test assertions) are stable regardless of declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum TableValue {
    Scalar(String),
    List(Vec<TableValue>),
    Map(BTreeMap<String, TableValue>),
}

impl TableValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            TableValue::Scalar(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[TableValue]> {
        match self {
            TableValue::List(l) => Some(l.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, TableValue>> {
        match self {
            TableValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&TableValue> {
        self.as_map().and_then(|m| m.get(key))
    }
}
