use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

pub const RC_ENV: &str = "TASKTRACKRC";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      ("data.location", "~/.tasktrack"),
      ("server.listen", "127.0.0.1:3000"),
      (
        "server.url",
        "http://127.0.0.1:3000"
      ),
      ("client.timeout", "10"),
      ("color", "on")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rcfile =
      resolve_rc_path(rc_override)?;
    if let Some(path) = rcfile {
      info!(rcfile = %path.display(), "loading rc file");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no rc file found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn server_url(&self) -> String {
    self
      .get("server.url")
      .unwrap_or_else(|| {
        "http://127.0.0.1:3000"
          .to_string()
      })
  }

  pub fn listen_addr(&self) -> String {
    self
      .get("server.listen")
      .unwrap_or_else(|| {
        "127.0.0.1:3000".to_string()
      })
  }

  pub fn client_timeout(
    &self
  ) -> anyhow::Result<Duration> {
    let raw = self
      .get("client.timeout")
      .unwrap_or_else(|| {
        "10".to_string()
      });
    let secs = raw
      .trim()
      .parse::<u64>()
      .with_context(|| {
        format!(
          "invalid client.timeout: \
           {raw}"
        )
      })?;
    if secs == 0 {
      return Err(anyhow!(
        "client.timeout must be at \
         least 1 second"
      ));
    }
    Ok(Duration::from_secs(secs))
  }

  /// Reads one rc file. `include` paths are relative to the including
  /// file; a file already loaded is not read twice.
  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    if self.loaded_files.contains(&path)
    {
      warn!(file = %path.display(), "rc file already loaded; skipping");
      return Ok(());
    }
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    self
      .loaded_files
      .push(path.clone());

    for (idx, raw) in
      text.lines().enumerate()
    {
      let located = || {
        format!(
          "{}:{}",
          path.display(),
          idx + 1
        )
      };
      match parse_rc_line(raw)
        .with_context(located)?
      {
        RcLine::Blank => {}
        RcLine::Entry(key, value) => {
          trace!(key, value, "rc entry");
          self.map.insert(
            key.to_string(),
            value.to_string()
          );
        }
        RcLine::Include(target) => {
          let target =
            expand_tilde(Path::new(target));
          let target = match path.parent()
          {
            Some(dir)
              if target.is_relative() =>
            {
              dir.join(target)
            }
            _ => target
          };
          if target.exists() {
            self.load_file(&target)?;
          } else {
            warn!(include = %target.display(), at = %located(), "included rc file missing");
          }
        }
      }
    }

    Ok(())
  }
}

#[derive(Debug, PartialEq, Eq)]
enum RcLine<'a> {
  Blank,
  Entry(&'a str, &'a str),
  Include(&'a str)
}

fn parse_rc_line(
  raw: &str
) -> anyhow::Result<RcLine<'_>> {
  let line = raw
    .split_once('#')
    .map_or(raw, |(kept, _)| kept)
    .trim();
  if line.is_empty() {
    return Ok(RcLine::Blank);
  }
  if let Some(target) =
    line.strip_prefix("include ")
  {
    let target = target.trim();
    if target.is_empty() {
      return Err(anyhow!(
        "include needs a path"
      ));
    }
    return Ok(RcLine::Include(target));
  }
  match line.split_once('=') {
    Some((key, value))
      if !key.trim().is_empty() =>
    {
      Ok(RcLine::Entry(
        key.trim(),
        value.trim()
      ))
    }
    _ => Err(anyhow!(
      "invalid config line: {line}"
    ))
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping rc file"
    );
    return Ok(None);
  };
  let candidate =
    home.join(".tasktrackrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".tasktrack"))
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::time::Duration;

  use tempfile::tempdir;

  use super::{
    Config,
    RcLine,
    parse_rc_line
  };

  #[test]
  fn rc_file_with_include_and_overrides()
   {
    let dir = tempdir().unwrap();
    let extra = dir.path().join("extra.rc");
    fs::write(
      &extra,
      "client.timeout = 3\n"
    )
    .unwrap();
    let main = dir.path().join("main.rc");
    fs::write(
      &main,
      "# tasktrack settings\n\
       server.url = http://tasks.local:8080 # remote box\n\
       include extra.rc\n\
       color = off\n"
    )
    .unwrap();

    let mut cfg =
      Config::load(Some(&main))
        .unwrap();
    assert_eq!(
      cfg.server_url(),
      "http://tasks.local:8080"
    );
    assert_eq!(
      cfg.client_timeout().unwrap(),
      Duration::from_secs(3)
    );
    assert_eq!(
      cfg.get_bool("color"),
      Some(false)
    );
    assert_eq!(cfg.loaded_files.len(), 2);

    cfg.apply_overrides([(
      "rc.server.listen".to_string(),
      "0.0.0.0:9000".to_string()
    )]);
    assert_eq!(
      cfg.listen_addr(),
      "0.0.0.0:9000"
    );
  }

  #[test]
  fn malformed_line_is_reported() {
    let dir = tempdir().unwrap();
    let rc = dir.path().join("bad.rc");
    fs::write(&rc, "just words\n")
      .unwrap();

    let err = Config::load(Some(&rc))
      .unwrap_err();
    let text = format!("{err:#}");
    assert!(
      text.contains("bad.rc:1")
    );
    assert!(
      text.contains("invalid config line")
    );
  }

  #[test]
  fn rc_lines_parse_by_kind() {
    assert_eq!(
      parse_rc_line("  # note").unwrap(),
      RcLine::Blank
    );
    assert_eq!(
      parse_rc_line("color = off # tty")
        .unwrap(),
      RcLine::Entry("color", "off")
    );
    assert_eq!(
      parse_rc_line("include ~/x.rc")
        .unwrap(),
      RcLine::Include("~/x.rc")
    );
    assert!(
      parse_rc_line("= value").is_err()
    );
  }

  #[test]
  fn include_cycle_is_read_once() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.rc");
    let b = dir.path().join("b.rc");
    fs::write(
      &a,
      "include b.rc\ncolor = off\n"
    )
    .unwrap();
    fs::write(
      &b,
      "include a.rc\nclient.timeout = 4\n"
    )
    .unwrap();

    let cfg =
      Config::load(Some(&a)).unwrap();
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.client_timeout().unwrap(),
      Duration::from_secs(4)
    );
    assert_eq!(
      cfg.get("color").as_deref(),
      Some("off")
    );
  }

  #[test]
  fn zero_timeout_is_rejected() {
    let mut cfg = Config::default();
    cfg.apply_overrides([(
      "client.timeout".to_string(),
      "0".to_string()
    )]);
    assert!(
      cfg.client_timeout().is_err()
    );
  }
}
