//! The native side of the script marshalling boundary. `LuaValue` stands
//! between request/response data and `mlua::Value` so conversions are
//! explicit and recursive rather than routed through `mlua`'s serde feature.

use crate::prelude::*;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum LuaValue {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Array(Vec<LuaValue>),
    Table(BTreeMap<String, LuaValue>),
    Undefined,
}

impl LuaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LuaValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            LuaValue::Int(i) => Some(*i),
            LuaValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }
}

impl From<&str> for LuaValue {
    fn from(s: &str) -> Self {
        LuaValue::String(s.to_string())
    }
}

impl From<String> for LuaValue {
    fn from(s: String) -> Self {
        LuaValue::String(s)
    }
}

impl From<bool> for LuaValue {
    fn from(b: bool) -> Self {
        LuaValue::Bool(b)
    }
}

impl From<HashMap<String, String>> for LuaValue {
    fn from(map: HashMap<String, String>) -> Self {
        let table = map.into_iter().map(|(k, v)| (k, LuaValue::String(v))).collect();
        LuaValue::Table(table)
    }
}

/// Converts a native value into an `mlua::Value` living in `lua`'s heap.
/// Recurses through arrays and tables; a float that demotes cleanly to an
/// integer stays a float here — the demotion rule only applies on the way
/// back in, per the marshalling contract.
pub fn to_lua(lua: &mlua::Lua, value: &LuaValue) -> mlua::Result<mlua::Value> {
    Ok(match value {
        LuaValue::Int(i) => mlua::Value::Integer(*i),
        LuaValue::Float(f) => mlua::Value::Number(*f),
        LuaValue::String(s) => mlua::Value::String(lua.create_string(s)?),
        LuaValue::Bool(b) => mlua::Value::Boolean(*b),
        LuaValue::Array(items) => {
            let table = lua.create_table()?;
            for (idx, item) in items.iter().enumerate() {
                table.set(idx + 1, to_lua(lua, item)?)?;
            }
            mlua::Value::Table(table)
        }
        LuaValue::Table(map) => {
            let table = lua.create_table()?;
            for (key, item) in map {
                table.set(key.as_str(), to_lua(lua, item)?)?;
            }
            mlua::Value::Table(table)
        }
        LuaValue::Undefined => mlua::Value::Nil,
    })
}

/// Converts an `mlua::Value` back to the native sum type. Integral floats
/// are demoted to `Int` here, per the spec's marshalling rule — scripts
/// that compute `#t` or do float arithmetic on whole numbers should not
/// surprise native callers with a `Float` variant.
pub fn from_lua(value: &mlua::Value) -> mlua::Result<LuaValue> {
    Ok(match value {
        mlua::Value::Nil => LuaValue::Undefined,
        mlua::Value::Boolean(b) => LuaValue::Bool(*b),
        mlua::Value::Integer(i) => LuaValue::Int(*i),
        mlua::Value::Number(f) => {
            if f.fract() == 0.0 && f.is_finite() && f.abs() < i64::MAX as f64 {
                LuaValue::Int(*f as i64)
            } else {
                LuaValue::Float(*f)
            }
        }
        mlua::Value::String(s) => LuaValue::String(s.to_str()?.to_string()),
        mlua::Value::Table(t) => {
            let len = t.raw_len();
            if len > 0 && t.clone().pairs::<mlua::Value, mlua::Value>().count() == len {
                let mut items = Vec::with_capacity(len);
                for i in 1..=len {
                    let v: mlua::Value = t.get(i)?;
                    items.push(from_lua(&v)?);
                }
                LuaValue::Array(items)
            } else {
                let mut map = BTreeMap::new();
                for pair in t.clone().pairs::<String, mlua::Value>() {
                    let (k, v) = pair?;
                    map.insert(k, from_lua(&v)?);
                }
                LuaValue::Table(map)
            }
        }
        other => LuaValue::String(format!("{other:?}")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_floats_demote_on_the_way_in() {
        let lua = mlua::Lua::new();
        let v = mlua::Value::Number(3.0);
        assert_eq!(from_lua(&v).unwrap(), LuaValue::Int(3));
        let v = mlua::Value::Number(3.5);
        assert_eq!(from_lua(&v).unwrap(), LuaValue::Float(3.5));
        let _ = lua;
    }

    #[test]
    fn round_trips_a_nested_table() {
        let lua = mlua::Lua::new();
        let mut inner = BTreeMap::new();
        inner.insert("a".to_string(), LuaValue::Int(1));
        let value = LuaValue::Table(inner);
        let lv = to_lua(&lua, &value).unwrap();
        let back = from_lua(&lv).unwrap();
        assert_eq!(back, value);
    }
}
