use std::{
    env,
    fmt::{Debug, Display},
    path::{Path, PathBuf},
    str::FromStr,
    sync::OnceLock,
};

use tracing::{info, warn};

pub(crate) struct Config {
    inner: Box<ConfigInner>,
}

pub(crate) fn get() -> &'static Config {
    static CELL: OnceLock<Config> = OnceLock::new();

    CELL.get_or_init(|| {
        let config = Config {
            inner: Box::new(ConfigInner {
                port: try_load("PORT", 3000),
                data_path: try_load("STATS_DATA_PATH", PathBuf::from("stats-data.json")),
                public_dir: try_load("STATS_PUBLIC_DIR", PathBuf::from("public")),
                log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned()),
            }),
        };

        info!(
            port = config.inner.port,
            data_path = %config.inner.data_path.display(),
            public_dir = %config.inner.public_dir.display(),
            log_level = config.inner.log_level,
            "initialized config"
        );

        config
    })
}

impl Config {
    pub(crate) fn get_address(&'static self) -> String {
        format!("0.0.0.0:{}", self.inner.port)
    }

    pub(crate) fn get_data_path(&'static self) -> &'_ Path {
        &self.inner.data_path
    }

    pub(crate) fn get_public_dir(&'static self) -> &'_ Path {
        &self.inner.public_dir
    }
}

#[derive(Debug)]
struct ConfigInner {
    port: u16,
    data_path: PathBuf,
    public_dir: PathBuf,
    log_level: String,
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Debug,
    T::Err: Display,
{
    parse_or(key, env::var(key).ok(), default)
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Debug,
    T::Err: Display,
{
    let Some(raw) = raw else {
        info!("{key} not set, using default: {default:?}");
        return default;
    };

    raw.parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}, using default: {default:?}");
        default
    })
}
