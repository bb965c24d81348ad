use once_cell::sync::Lazy;
use std::path::PathBuf;

static DEFAULT_DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::data_local_dir()
        .map(|p| p.join("webgen"))
        .unwrap_or_else(|| PathBuf::from("~/.local/share/webgen"))
});

// Fallback only, get_config_dir checks XDG_CONFIG_HOME first
static DEFAULT_CONFIG_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::config_dir()
        .map(|p| p.join("webgen"))
        .unwrap_or_else(|| PathBuf::from("~/.config/webgen"))
});

pub fn get_config_dir() -> PathBuf {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config_home).join("webgen")
    } else {
        DEFAULT_CONFIG_DIR.clone()
    }
}

pub fn get_data_dir() -> std::io::Result<PathBuf> {
    let path = if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data_home).join("webgen")
    } else {
        DEFAULT_DATA_DIR.clone()
    };
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

pub fn get_default_config() -> String {
    include_str!("../data/config.yml").to_string()
}
