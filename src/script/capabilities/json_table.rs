//! `server.table_to_json` / `server.json_to_table` — JSON round-trip,
//! shared with the JWT capability for claims marshalling.

use crate::prelude::*;

pub fn register(lua: &mlua::Lua, server: &mlua::Table) -> Result<()> {
    let to_json = lua.create_function(|_, table: mlua::Value| {
        let value = lua_to_json(&table)?;
        serde_json::to_string(&value).map_err(mlua::Error::external)
    })?;
    server.set("table_to_json", to_json)?;

    let from_json = lua.create_function(|lua, source: String| {
        let value: serde_json::Value = serde_json::from_str(&source).map_err(mlua::Error::external)?;
        json_to_lua(lua, &value)
    })?;
    server.set("json_to_table", from_json)?;
    Ok(())
}

/// Arrays and objects are distinguished on the way in by Lua's own
/// convention: a table is an array when its keys are a dense `1..=n` run.
pub fn lua_to_json(value: &mlua::Value) -> mlua::Result<serde_json::Value> {
    Ok(match value {
        mlua::Value::Nil => serde_json::Value::Null,
        mlua::Value::Boolean(b) => serde_json::Value::Bool(*b),
        mlua::Value::Integer(i) => serde_json::Value::Number((*i).into()),
        mlua::Value::Number(f) => serde_json::Number::from_f64(*f).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null),
        mlua::Value::String(s) => serde_json::Value::String(s.to_str()?.to_string()),
        mlua::Value::Table(t) => {
            let len = t.raw_len();
            if len > 0 && t.clone().pairs::<mlua::Value, mlua::Value>().count() == len {
                let mut items = Vec::with_capacity(len);
                for i in 1..=len {
                    let v: mlua::Value = t.get(i)?;
                    items.push(lua_to_json(&v)?);
                }
                serde_json::Value::Array(items)
            } else {
                let mut map = serde_json::Map::new();
                for pair in t.clone().pairs::<String, mlua::Value>() {
                    let (k, v) = pair?;
                    map.insert(k, lua_to_json(&v)?);
                }
                serde_json::Value::Object(map)
            }
        }
        other => serde_json::Value::String(format!("{other:?}")),
    })
}

pub fn json_to_lua(lua: &mlua::Lua, value: &serde_json::Value) -> mlua::Result<mlua::Value> {
    Ok(match value {
        serde_json::Value::Null => mlua::Value::Nil,
        serde_json::Value::Bool(b) => mlua::Value::Boolean(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                mlua::Value::Integer(i)
            } else {
                mlua::Value::Number(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => mlua::Value::String(lua.create_string(s)?),
        serde_json::Value::Array(items) => {
            let table = lua.create_table()?;
            for (idx, item) in items.iter().enumerate() {
                table.set(idx + 1, json_to_lua(lua, item)?)?;
            }
            mlua::Value::Table(table)
        }
        serde_json::Value::Object(map) => {
            let table = lua.create_table()?;
            for (k, v) in map {
                table.set(k.as_str(), json_to_lua(lua, v)?)?;
            }
            mlua::Value::Table(table)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_an_object_through_json() {
        let lua = mlua::Lua::new();
        let table = lua.create_table().unwrap();
        table.set("a", 1).unwrap();
        let json = lua_to_json(&mlua::Value::Table(table)).unwrap();
        assert_eq!(json["a"], 1);
        let back = json_to_lua(&lua, &json).unwrap();
        assert!(matches!(back, mlua::Value::Table(_)));
    }
}
