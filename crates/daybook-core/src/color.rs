pub fn normalize_hex_color(
  value: &str
) -> Option<String> {
  let raw = value
    .trim()
    .trim_start_matches('#');
  if raw.len() == 3
    && raw
      .chars()
      .all(|ch| ch.is_ascii_hexdigit())
  {
    let mut expanded =
      String::with_capacity(7);
    expanded.push('#');
    for ch in raw.chars() {
      expanded.push(ch);
      expanded.push(ch);
    }
    return Some(
      expanded.to_ascii_lowercase()
    );
  }

  if raw.len() == 6
    && raw
      .chars()
      .all(|ch| ch.is_ascii_hexdigit())
  {
    return Some(format!(
      "#{}",
      raw.to_ascii_lowercase()
    ));
  }

  None
}

pub fn hex_to_rgb(
  value: &str
) -> Option<(u8, u8, u8)> {
  let hex = normalize_hex_color(value)?;
  let channel =
    |range: std::ops::Range<usize>| {
    u8::from_str_radix(&hex[range], 16)
      .ok()
  };
  Some((
    channel(1..3)?,
    channel(3..5)?,
    channel(5..7)?
  ))
}

#[cfg(test)]
mod tests {
  use super::{
    hex_to_rgb,
    normalize_hex_color
  };

  #[test]
  fn expands_short_and_lowercases() {
    assert_eq!(
      normalize_hex_color("#ABC")
        .as_deref(),
      Some("#aabbcc")
    );
    assert_eq!(
      normalize_hex_color("E1F5FE")
        .as_deref(),
      Some("#e1f5fe")
    );
    assert_eq!(
      normalize_hex_color("pink"),
      None
    );
  }

  #[test]
  fn splits_channels() {
    assert_eq!(
      hex_to_rgb("#FCE4EC"),
      Some((0xfc, 0xe4, 0xec))
    );
    assert_eq!(hex_to_rgb("#12"), None);
  }
}
