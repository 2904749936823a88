//! Inline HTML error bodies, trimmed from the grounding codebase's
//! `generate_default_error_page` down to the closed set of status codes
//! the core ever emits.

use hyper::StatusCode;

fn description(code: u16) -> &'static str {
  match code {
    400 => "The request was invalid.",
    403 => "You're not authorized to access this resource.",
    404 => "The requested resource wasn't found. Double-check the URL if entered manually.",
    405 => "The request method is not allowed for this resource.",
    500 => "The server encountered an unexpected error.",
    502 => "The server, acting as a gateway, received an invalid response.",
    503 => "The server is temporarily unavailable. Try again later.",
    504 => "The server, acting as a gateway, timed out waiting for a response.",
    _ => "The server encountered an unexpected error.",
  }
}

/// Returns a tiny inline HTML body for `status`. Unrecognised codes fall
/// back to the 500 body.
pub fn get_error_page(status: StatusCode) -> String {
  let code = status.as_u16();
  let recognised = matches!(code, 400 | 403 | 404 | 405 | 500 | 502 | 503 | 504);
  let code = if recognised { code } else { 500 };

  let title = match StatusCode::from_u16(code).ok().and_then(|s| s.canonical_reason()) {
    Some(reason) => format!("{code} {reason}"),
    None => code.to_string(),
  };

  format!(
    "<!DOCTYPE html>
<html lang=\"en\">
<head>
    <meta charset=\"UTF-8\">
    <title>{title}</title>
</head>
<body>
    <h1>{title}</h1>
    <p>{}</p>
</body>
</html>",
    description(code)
  )
}
