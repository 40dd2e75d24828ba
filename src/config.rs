use crate::resolver::SingletonPolicy;
use dotenv::dotenv;
use std::{env::var, path::PathBuf};

pub struct Config {
    pub port: u16,
    pub public_dir: PathBuf,
    pub assets_file: PathBuf,
    pub index_file: String,
    pub protected_names: Vec<String>,
    pub singleton_policy: SingletonPolicy,
}

impl Config {
    pub fn get() -> Self {
        dotenv().ok();

        Self::from_lookup(|key| var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            port: value("RFS_PORT")
                .or_else(|| value("PORT"))
                .and_then(|port| port.parse::<u16>().ok())
                .unwrap_or(9060),
            public_dir: value("RFS_PUBLIC_DIR").unwrap_or_else(|| "public".into()).into(),
            assets_file: value("RFS_ASSETS_FILE")
                .unwrap_or_else(|| ".glitch-assets".into())
                .into(),
            index_file: value("RFS_INDEX_FILE").unwrap_or_else(|| "index.html".into()),
            protected_names: value("RFS_PROTECTED").map_or_else(
                || vec!["index.html".into()],
                |protected| {
                    protected
                        .split(',')
                        .map(|name| name.trim().to_string())
                        .filter(|name| !name.is_empty())
                        .collect()
                },
            ),
            singleton_policy: value("RFS_SINGLETON_POLICY")
                .and_then(|policy| policy.parse().ok())
                .unwrap_or_default(),
        }
    }
}
