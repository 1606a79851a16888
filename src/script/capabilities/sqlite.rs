//! `server.sqlite` — a thin adapter over `rusqlite`. Statements and
//! connections close when their Lua userdata is garbage collected; `close`
//! makes that deterministic instead of waiting on the collector.

use crate::prelude::*;
use std::cell::RefCell;

pub fn register(lua: &mlua::Lua, server: &mlua::Table) -> Result<()> {
    let sqlite = lua.create_table()?;
    sqlite.set(
        "open",
        lua.create_function(|lua, (path, mode): (String, Option<String>)| {
            Ok(match open_with_mode(&path, mode.as_deref().unwrap_or("RW")) {
                Ok(conn) => (true, mlua::Value::UserData(lua.create_userdata(SqliteDb(RefCell::new(Some(conn))))?)),
                Err(e) => (false, mlua::Value::String(lua.create_string(e.to_string())?)),
            })
        })?,
    )?;
    server.set("sqlite", sqlite)?;
    Ok(())
}

fn open_with_mode(path: &str, mode: &str) -> Result<rusqlite::Connection> {
    let flags = match mode {
        "RO" => rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        "CRW" => rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE | rusqlite::OpenFlags::SQLITE_OPEN_CREATE,
        _ => rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE,
    };
    rusqlite::Connection::open_with_flags(path, flags).map_err(CserveError::from)
}

struct SqliteDb(RefCell<Option<rusqlite::Connection>>);

impl mlua::UserData for SqliteDb {
    fn add_methods<M: mlua::UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("exec", |lua, this, (sql, args): (String, mlua::Variadic<mlua::Value>)| {
            let borrow = this.0.borrow();
            let Some(conn) = borrow.as_ref() else {
                return Ok((false, mlua::Value::String(lua.create_string("database is closed")?)));
            };
            let params = match args.iter().map(lua_to_rusqlite).collect::<mlua::Result<Vec<_>>>() {
                Ok(p) => p,
                Err(e) => return Ok((false, mlua::Value::String(lua.create_string(e.to_string())?))),
            };
            let refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();
            Ok(match conn.execute(&sql, refs.as_slice()) {
                Ok(rows) => (true, mlua::Value::Integer(rows as i64)),
                Err(e) => (false, mlua::Value::String(lua.create_string(e.to_string())?)),
            })
        });

        methods.add_method("query", |lua, this, (sql, args): (String, mlua::Variadic<mlua::Value>)| {
            let borrow = this.0.borrow();
            let Some(conn) = borrow.as_ref() else {
                return Ok((false, mlua::Value::String(lua.create_string("database is closed")?)));
            };
            match run_query(lua, conn, &sql, &args) {
                Ok(rows_table) => Ok((true, mlua::Value::Table(rows_table))),
                Err(e) => Ok((false, mlua::Value::String(lua.create_string(e.to_string())?))),
            }
        });

        methods.add_method("close", |_, this, ()| {
            this.0.borrow_mut().take();
            Ok((true, mlua::Value::Nil))
        });
    }
}

fn run_query(
    lua: &mlua::Lua,
    conn: &rusqlite::Connection,
    sql: &str,
    args: &[mlua::Value],
) -> mlua::Result<mlua::Table> {
    let mut stmt = conn.prepare(sql).map_err(mlua::Error::external)?;
    let col_count = stmt.column_count();
    let params = args.iter().map(lua_to_rusqlite).collect::<mlua::Result<Vec<_>>>()?;
    let refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

    let rows_table = lua.create_table()?;
    let mut rows = stmt.query(refs.as_slice()).map_err(mlua::Error::external)?;
    let mut idx = 1;
    while let Some(row) = rows.next().map_err(mlua::Error::external)? {
        let row_table = lua.create_table()?;
        for col in 0..col_count {
            let value: rusqlite::types::Value = row.get(col).map_err(mlua::Error::external)?;
            row_table.set(col, rusqlite_to_lua(lua, &value)?)?;
        }
        rows_table.set(idx, row_table)?;
        idx += 1;
    }
    Ok(rows_table)
}

fn lua_to_rusqlite(value: &mlua::Value) -> mlua::Result<rusqlite::types::Value> {
    Ok(match value {
        mlua::Value::Nil => rusqlite::types::Value::Null,
        mlua::Value::Boolean(b) => rusqlite::types::Value::Integer(*b as i64),
        mlua::Value::Integer(i) => rusqlite::types::Value::Integer(*i),
        mlua::Value::Number(f) => rusqlite::types::Value::Real(*f),
        mlua::Value::String(s) => {
            let bytes = s.as_bytes().to_vec();
            if bytes.contains(&0) {
                rusqlite::types::Value::Blob(bytes)
            } else {
                rusqlite::types::Value::Text(String::from_utf8_lossy(&bytes).into_owned())
            }
        }
        other => return Err(mlua::Error::RuntimeError(format!("cannot bind {other:?} to sqlite"))),
    })
}

fn rusqlite_to_lua(lua: &mlua::Lua, value: &rusqlite::types::Value) -> mlua::Result<mlua::Value> {
    Ok(match value {
        rusqlite::types::Value::Null => mlua::Value::Nil,
        rusqlite::types::Value::Integer(i) => mlua::Value::Integer(*i),
        rusqlite::types::Value::Real(f) => mlua::Value::Number(*f),
        rusqlite::types::Value::Text(s) => mlua::Value::String(lua.create_string(s)?),
        rusqlite::types::Value::Blob(b) => mlua::Value::String(lua.create_string(b)?),
    })
}
