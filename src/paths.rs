use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

const DATA_DIR_ENV: &str = "TIMETHREAD_DATA_DIR";
const SERVER_ENV: &str = "TIMETHREAD_SERVER";
const DEFAULT_SERVER: &str = "http://localhost:3000";

pub fn database_file_path() -> Result<PathBuf> {
    if let Some(dir) = env::var_os(DATA_DIR_ENV).filter(|dir| !dir.is_empty()) {
        return Ok(PathBuf::from(dir).join("timethread.db"));
    }
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("timethread").join("timethread.db"))
}

pub fn server_base_url(flag: Option<&str>) -> String {
    resolve_server(flag, env::var(SERVER_ENV).ok().as_deref())
}

fn resolve_server(flag: Option<&str>, from_env: Option<&str>) -> String {
    [flag, from_env]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|url| !url.is_empty())
        .unwrap_or(DEFAULT_SERVER)
        .to_string()
}
