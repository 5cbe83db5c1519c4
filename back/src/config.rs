use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use eyre::WrapErr;
use serde::{Deserialize, Serialize};

use crate::tasks::ReminderCancellation;

const CONFIG_FILE: &str = "checkdone.ron";
const DATA_DIR: &str = ".checkdone";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the persisted records.
    pub data_dir: PathBuf,
    pub reminder_cancellation: ReminderCancellation,
    /// Title shown on reminder notifications, the task title is the body.
    pub reminder_title: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DATA_DIR),
            reminder_cancellation: ReminderCancellation::default(),
            reminder_title: String::from("Task reminder"),
        }
    }
}

impl Config {
    /// Read a RON config file, a missing file gives the defaults.
    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();

        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => eyre::bail!(err),
        };

        ron::de::from_reader(file).wrap_err_with(|| format!("invalid config {}", path.display()))
    }

    /// Load from `CHECKDONE_CONFIG` and apply `CHECKDONE_DATA_DIR`.
    pub fn from_env() -> eyre::Result<Self> {
        let path = env::var("CHECKDONE_CONFIG").unwrap_or_else(|_| String::from(CONFIG_FILE));
        let mut config = Self::load(path)?;

        if let Ok(dir) = env::var("CHECKDONE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    pub fn store(&self, path: impl AsRef<Path>) -> eyre::Result<()> {
        let text = ron::ser::to_string_pretty(self, Default::default())?;
        fs::write(path.as_ref(), text)
            .wrap_err_with(|| format!("failed to write {}", path.as_ref().display()))?;
        Ok(())
    }
}
