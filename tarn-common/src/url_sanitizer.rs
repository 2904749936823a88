//! Request-path sanitization, run before a path is ever joined to a
//! host's web root. Grounded on the segment-based traversal resolution
//! in the grounding codebase's own URL sanitizer, trimmed to what a
//! static-file pipeline needs: no double-slash toggle, no
//! control-character re-encoding for downstream HTTP clients.

use anyhow::{anyhow, Result};

/// Rejects malformed percent-encoding and embedded null bytes, decodes
/// the rest, then resolves `.`/`..` segments so the result can never
/// walk above whatever root it is later joined to.
pub fn sanitize_path(path: &str) -> Result<String> {
  let bytes = path.as_bytes();
  let mut decoded = Vec::with_capacity(bytes.len());

  let mut i = 0;
  while i < bytes.len() {
    let byte = bytes[i];
    if byte == 0 {
      return Err(anyhow!("path contains a null byte"));
    }
    if byte == b'%' {
      if i + 2 >= bytes.len() {
        return Err(anyhow!("malformed percent-encoding"));
      }
      let value =
        hex_byte(bytes[i + 1], bytes[i + 2]).ok_or_else(|| anyhow!("malformed percent-encoding"))?;
      if value == 0 {
        return Err(anyhow!("path contains a null byte"));
      }
      decoded.push(value);
      i += 3;
    } else {
      decoded.push(byte);
      i += 1;
    }
  }

  let decoded = String::from_utf8(decoded).map_err(|_| anyhow!("invalid UTF-8 in path"))?;

  let mut segments: Vec<&str> = Vec::new();
  for segment in decoded.split('/') {
    match segment {
      "" | "." => continue,
      ".." => {
        segments.pop();
      }
      other => segments.push(other),
    }
  }

  let mut sanitized = String::with_capacity(decoded.len().max(1));
  for segment in &segments {
    sanitized.push('/');
    sanitized.push_str(segment);
  }
  if sanitized.is_empty() {
    sanitized.push('/');
  } else if decoded.ends_with('/') {
    sanitized.push('/');
  }

  Ok(sanitized)
}

fn hex_byte(hi: u8, lo: u8) -> Option<u8> {
  fn val(c: u8) -> Option<u8> {
    match c {
      b'0'..=b'9' => Some(c - b'0'),
      b'a'..=b'f' => Some(10 + (c - b'a')),
      b'A'..=b'F' => Some(10 + (c - b'A')),
      _ => None,
    }
  }
  Some(val(hi)? << 4 | val(lo)?)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn leaves_a_clean_path_alone() {
    assert_eq!(sanitize_path("/index.html").unwrap(), "/index.html");
  }

  #[test]
  fn resolves_parent_navigation_within_the_path() {
    assert_eq!(sanitize_path("/assets/../index.html").unwrap(), "/index.html");
    assert_eq!(sanitize_path("/a/b/../../index.html").unwrap(), "/index.html");
  }

  #[test]
  fn parent_navigation_above_the_root_cannot_escape_it() {
    assert_eq!(sanitize_path("/../../../etc/passwd").unwrap(), "/etc/passwd");
    assert_eq!(sanitize_path("/..").unwrap(), "/");
  }

  #[test]
  fn current_directory_segments_are_dropped() {
    assert_eq!(sanitize_path("/./assets/./app.js").unwrap(), "/assets/app.js");
  }

  #[test]
  fn preserves_a_trailing_slash() {
    assert_eq!(sanitize_path("/blog/").unwrap(), "/blog/");
    assert_eq!(sanitize_path("/blog/../").unwrap(), "/");
  }

  #[test]
  fn decodes_percent_encoded_segments() {
    assert_eq!(sanitize_path("/conf%69g.json").unwrap(), "/config.json");
  }

  #[test]
  fn rejects_a_null_byte_encoded_or_literal() {
    assert!(sanitize_path("/test%00").is_err());
    assert!(sanitize_path("/test\0").is_err());
  }

  #[test]
  fn rejects_malformed_percent_encoding() {
    assert!(sanitize_path("/%zz").is_err());
    assert!(sanitize_path("/%4").is_err());
  }

  #[test]
  fn encoded_traversal_is_resolved_like_the_literal_form() {
    assert_eq!(sanitize_path("/assets/%2e%2e/index.html").unwrap(), "/index.html");
  }
}
