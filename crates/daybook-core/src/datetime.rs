use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Days,
  Local,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

pub const DATE_FORMAT: &str =
  "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

const TIMEZONE_CONFIG_FILE: &str =
  "daybook-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "DAYBOOK_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "DAYBOOK_TIME_CONFIG";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Where "today" is measured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Zone {
  Local,
  Named(Tz)
}

impl Zone {
  #[must_use]
  pub fn local_now(
    self,
    now: DateTime<Utc>
  ) -> NaiveDateTime {
    match self {
      | Zone::Local => {
        now
          .with_timezone(&Local)
          .naive_local()
      }
      | Zone::Named(tz) => {
        now.with_timezone(&tz).naive_local()
      }
    }
  }

  #[must_use]
  pub fn today(
    self,
    now: DateTime<Utc>
  ) -> NaiveDate {
    self.local_now(now).date()
  }
}

/// Resolution order: `$DAYBOOK_TIMEZONE`, the
/// `daybook-time.toml` file, the rc
/// `timezone` key, then the system zone.
#[tracing::instrument(skip(data_dir))]
pub fn resolve_zone(
  rc_timezone: Option<&str>,
  data_dir: &Path
) -> Zone {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return Zone::Named(tz);
  }

  let path =
    timezone_config_path(data_dir);
  if let Some(tz) =
    load_timezone_from_file(&path)
  {
    return Zone::Named(tz);
  }

  if let Some(raw) = rc_timezone
    && let Some(tz) =
      parse_timezone(raw, "rc.timezone")
  {
    return Zone::Named(tz);
  }

  tracing::debug!(
    "no timezone configured; using \
     system local time"
  );
  Zone::Local
}

fn timezone_config_path(
  data_dir: &Path
) -> PathBuf {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return PathBuf::from(trimmed);
    }
  }

  data_dir.join(TIMEZONE_CONFIG_FILE)
}

fn load_timezone_from_file(
  path: &Path
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Monday and Sunday of the week containing
/// `day`.
#[must_use]
pub fn week_bounds(
  day: NaiveDate
) -> (NaiveDate, NaiveDate) {
  let week = day.week(Weekday::Mon);
  (week.first_day(), week.last_day())
}

#[must_use]
pub fn format_date(
  date: NaiveDate
) -> String {
  date.format(DATE_FORMAT).to_string()
}

#[must_use]
pub fn format_time(
  time: NaiveTime
) -> String {
  time.format(TIME_FORMAT).to_string()
}

#[tracing::instrument(skip(today))]
pub fn parse_date_input(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return shift_days(today, 1);
    }
    | "yesterday" => {
      return today
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| {
          anyhow!(
            "date out of range: \
             yesterday"
          )
        });
    }
    | _ => {}
  }

  if let Some(weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today, weekday
    ));
  }

  if let Some(rest) =
    lower.strip_prefix('+')
    && let Some(unit) = rest.chars().last()
  {
    let amount: u64 = rest
      [..rest.len() - unit.len_utf8()]
      .parse()
      .with_context(|| {
        format!(
          "invalid relative date: \
           {input}"
        )
      })?;
    match unit {
      | 'd' => {
        return shift_days(today, amount);
      }
      | 'w' => {
        return shift_days(
          today,
          amount.saturating_mul(7)
        );
      }
      | _ => {}
    }
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token,
      DATE_FORMAT
    )
  {
    return Ok(date);
  }

  Err(anyhow!(
    "unrecognized date: {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/tomorrow/yesterday, weekday \
     names (e.g. friday), +Nd, +Nw, \
     YYYY-MM-DD"
  })
}

pub fn parse_time_input(
  input: &str
) -> anyhow::Result<NaiveTime> {
  let (hour, minute) =
    parse_clock_time(input)
      .ok_or_else(|| {
        anyhow!(
          "unrecognized time: {input} \
           (expected HH:MM or H:MMam/pm)"
        )
      })?;
  NaiveTime::from_hms_opt(
    hour, minute, 0
  )
  .ok_or_else(|| {
    anyhow!("invalid time: {input}")
  })
}

fn shift_days(
  from: NaiveDate,
  days: u64
) -> anyhow::Result<NaiveDate> {
  from
    .checked_add_days(Days::new(days))
    .ok_or_else(|| {
      anyhow!(
        "date out of range: {from} + \
         {days} days"
      )
    })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday();
  let target_idx =
    target.num_days_from_monday();
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_days(Days::new(
      u64::from(delta)
    ))
    .unwrap_or(from)
}

fn clock_regex() -> Option<&'static Regex>
{
  static CLOCK_RE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  CLOCK_RE
    .get_or_init(|| {
      Regex::new(
        r"(?i)^(?P<hour>\d{1,2}):(?P<minute>\d{2})\s*(?P<ampm>[ap]m)?$",
      )
      .ok()
    })
    .as_ref()
}

fn parse_clock_time(
  token: &str
) -> Option<(u32, u32)> {
  let captures =
    clock_regex()?.captures(token.trim())?;

  let raw_hour = captures
    .name("hour")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  let minute = captures
    .name("minute")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  if minute > 59 {
    return None;
  }

  let hour = if let Some(ampm_match) =
    captures.name("ampm")
  {
    let ampm = ampm_match
      .as_str()
      .to_ascii_lowercase();
    if raw_hour == 0 || raw_hour > 12 {
      return None;
    }
    match ampm.as_str() {
      | "am" => {
        if raw_hour == 12 {
          0
        } else {
          raw_hour
        }
      }
      | "pm" => {
        if raw_hour == 12 {
          12
        } else {
          raw_hour + 12
        }
      }
      | _ => return None
    }
  } else {
    if raw_hour > 23 {
      return None;
    }
    raw_hour
  };

  Some((hour, minute))
}
