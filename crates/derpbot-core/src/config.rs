use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    errors::Error,
    menu::{browser::DEFAULT_BROWSE_TIMEOUT, choice::DEFAULT_CHOICE_TIMEOUT},
    Result,
};

const TEMPLATE_TOKEN: &str = "hidden";
const DEFAULT_PREFIX: &str = "!";

/// Typed configuration for the bot.
#[derive(Clone, Debug)]
pub struct Config {
    pub bot_token: String,
    pub default_prefix: String,
    pub prefix_file: PathBuf,
    pub links_file: PathBuf,
    pub choice_timeout: Duration,
    pub browse_timeout: Duration,
}

/// On-disk `config.json` shape.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    prefix: Option<String>,
}

impl Config {
    /// Load from `.env`, `config.json` and the environment (in rising precedence).
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        let config_path = env_path("DERPBOT_CONFIG").unwrap_or_else(|| PathBuf::from("config.json"));
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let file = read_config_file(config_path)?;

        let bot_token = env_str("DERPBOT_TOKEN")
            .and_then(non_empty)
            .or_else(|| file.as_ref().and_then(|f| f.token.clone()).and_then(non_empty))
            .filter(|t| t != TEMPLATE_TOKEN);

        let Some(bot_token) = bot_token else {
            if file.is_none() {
                write_template(config_path)?;
                return Err(Error::Config(format!(
                    "created a template {}; fill in the bot token and restart",
                    config_path.display()
                )));
            }
            return Err(Error::Config(format!(
                "no bot token: set DERPBOT_TOKEN or \"token\" in {}",
                config_path.display()
            )));
        };

        let default_prefix = env_str("DERPBOT_PREFIX")
            .and_then(non_empty)
            .or_else(|| file.as_ref().and_then(|f| f.prefix.clone()).and_then(non_empty))
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());

        let prefix_file =
            env_path("DERPBOT_PREFIX_FILE").unwrap_or_else(|| PathBuf::from("prefixes.json"));
        let links_file = env_path("DERPBOT_LINKS_FILE").unwrap_or_else(|| PathBuf::from("links.txt"));

        let choice_timeout = env_u64("DERPBOT_CHOICE_TIMEOUT_SECS")
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CHOICE_TIMEOUT);
        let browse_timeout = env_u64("DERPBOT_BROWSE_TIMEOUT_SECS")
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_BROWSE_TIMEOUT);

        Ok(Self {
            bot_token,
            default_prefix,
            prefix_file,
            links_file,
            choice_timeout,
            browse_timeout,
        })
    }
}

fn read_config_file(path: &Path) -> Result<Option<ConfigFile>> {
    let txt = match fs::read_to_string(path) {
        Ok(txt) => txt,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let parsed = serde_json::from_str::<ConfigFile>(&txt)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn write_template(path: &Path) -> Result<()> {
    let template = ConfigFile {
        token: Some(TEMPLATE_TOKEN.to_string()),
        prefix: Some(DEFAULT_PREFIX.to_string()),
    };
    fs::write(path, serde_json::to_string_pretty(&template)?)?;
    Ok(())
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.trim().to_string())
    }
}
