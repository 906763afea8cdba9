use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow,
  bail
};
use tracing::{
  debug,
  info,
  warn
};

use crate::filter::Horizon;

const RC_ENV_VAR: &str = "DAYBOOKRC";
const RC_FILE_NAME: &str = ".daybookrc";
const DATA_DIR_NAME: &str = ".daybook";

/// Settings read from the rc file and
/// `rc.KEY=VALUE` overrides. Every key has a
/// built-in default.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
  /// `data.location`; `None` means
  /// `~/.daybook`.
  pub data_location: Option<PathBuf>,
  /// `default.view`: the list shown when
  /// no subcommand is given.
  pub default_view:  Horizon,
  pub color:         bool,
  pub timezone:      Option<String>,
  pub source:        Option<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      data_location: None,
      default_view:  Horizon::Today,
      color:         true,
      timezone:      None,
      source:        None
    }
  }
}

impl Config {
  #[tracing::instrument]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let Some(path) = locate_rc(rc_override)
    else {
      debug!("no rc file; using defaults");
      return Ok(cfg);
    };

    info!(rc = %path.display(), "loading rc file");
    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    cfg.read_rc(&text, &path)?;
    cfg.source = Some(path);
    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      let name = key
        .strip_prefix("rc.")
        .unwrap_or(key.as_str());
      debug!(key = name, value = %value, "applying override");
      self.set(name, &value).with_context(
        || format!("invalid override rc.{name}")
      )?;
    }
    Ok(())
  }

  /// Unknown keys are ignored with a
  /// warning; a bad value for a known key
  /// is an error.
  pub fn set(
    &mut self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    let value = value.trim();
    match key.trim() {
      | "data.location" => {
        self.data_location = (!value
          .is_empty())
        .then(|| expand_tilde(value));
      }
      | "default.view" => {
        self.default_view = value.parse()?;
      }
      | "color" => {
        self.color = parse_switch(value)?;
      }
      | "timezone" => {
        self.timezone = (!value.is_empty())
          .then(|| value.to_string());
      }
      | other => {
        warn!(key = other, "ignoring unknown setting");
      }
    }
    Ok(())
  }

  /// `--data` wins over `data.location`,
  /// which wins over `~/.daybook`.
  pub fn data_dir(
    &self,
    override_dir: Option<&Path>
  ) -> anyhow::Result<PathBuf> {
    if let Some(dir) = override_dir {
      return Ok(dir.to_path_buf());
    }
    if let Some(dir) = &self.data_location {
      return Ok(dir.clone());
    }
    dirs::home_dir()
      .map(|home| home.join(DATA_DIR_NAME))
      .ok_or_else(|| {
        anyhow!(
          "cannot determine home directory; \
           set data.location or pass --data"
        )
      })
  }

  fn read_rc(
    &mut self,
    text: &str,
    path: &Path
  ) -> anyhow::Result<()> {
    for (idx, raw_line) in
      text.lines().enumerate()
    {
      let line = raw_line
        .split_once('#')
        .map_or(raw_line, |(before, _)| {
          before
        })
        .trim();
      if line.is_empty() {
        continue;
      }

      let (key, value) =
        line.split_once('=').ok_or_else(
          || {
            anyhow!(
              "{}:{}: expected KEY = VALUE, \
               got {raw_line:?}",
              path.display(),
              idx + 1
            )
          }
        )?;
      self.set(key, value).with_context(
        || {
          format!(
            "{}:{}",
            path.display(),
            idx + 1
          )
        }
      )?;
    }
    Ok(())
  }
}

// `--rcfile`, then `$DAYBOOKRC` (`/dev/null`
// turns the rc file off), then
// `~/.daybookrc` if it exists.
fn locate_rc(
  rc_override: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = rc_override {
    return Some(path.to_path_buf());
  }

  if let Some(env) =
    std::env::var_os(RC_ENV_VAR)
  {
    return (env != "/dev/null")
      .then(|| PathBuf::from(env));
  }

  dirs::home_dir()
    .map(|home| home.join(RC_FILE_NAME))
    .filter(|candidate| candidate.exists())
}

fn expand_tilde(value: &str) -> PathBuf {
  match value
    .strip_prefix("~/")
    .zip(dirs::home_dir())
  {
    | Some((rest, home)) => home.join(rest),
    | None => PathBuf::from(value)
  }
}

fn parse_switch(
  value: &str
) -> anyhow::Result<bool> {
  match value
    .to_ascii_lowercase()
    .as_str()
  {
    | "on" | "yes" | "true" | "1" => {
      Ok(true)
    }
    | "off" | "no" | "false" | "0" => {
      Ok(false)
    }
    | other => {
      bail!(
        "expected on or off, got {other:?}"
      )
    }
  }
}
