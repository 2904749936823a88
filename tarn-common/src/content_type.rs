//! Maps a request path's file extension to a MIME type from a closed
//! table. Unlike the grounding codebase's optional `static` feature
//! (which defers to `new_mime_guess`'s open-ended extension database),
//! the type resolved here must stay within the fixed set the response
//! cache and error pages are tested against, so the table is closed and
//! hand-written rather than pulled from a crate.

use std::path::Path;

/// Returns the MIME type for `path`'s extension, matched
/// case-insensitively over ASCII letters. Unknown or missing extensions
/// yield `application/octet-stream`.
pub fn get_content_type(path: &Path) -> &'static str {
  let extension = match path.extension().and_then(|ext| ext.to_str()) {
    Some(ext) => ext,
    None => return "application/octet-stream",
  };

  match extension.to_ascii_lowercase().as_str() {
    "html" | "htm" => "text/html",
    "css" => "text/css",
    "js" => "text/javascript",
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "pdf" => "application/pdf",
    "txt" => "text/plain",
    "json" => "application/json",
    "xml" => "application/xml",
    "ico" => "image/x-icon",
    "svg" => "image/svg+xml",
    "mp3" => "audio/mpeg",
    "mp4" => "video/mp4",
    "zip" => "application/zip",
    "gz" => "application/gzip",
    "bmp" => "image/bmp",
    "avi" => "video/x-msvideo",
    "tar" => "application/x-tar",
    "rar" => "application/vnd.rar",
    "7z" => "application/x-7z-compressed",
    "doc" => "application/msword",
    "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "xls" => "application/vnd.ms-excel",
    "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "ppt" => "application/vnd.ms-powerpoint",
    "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    _ => "application/octet-stream",
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;

  #[test]
  fn matches_known_extensions() {
    assert_eq!(get_content_type(&PathBuf::from("index.html")), "text/html");
    assert_eq!(get_content_type(&PathBuf::from("app.js")), "text/javascript");
    assert_eq!(get_content_type(&PathBuf::from("archive.tar")), "application/x-tar");
  }

  #[test]
  fn is_case_insensitive() {
    assert_eq!(get_content_type(&PathBuf::from("PHOTO.JPG")), "image/jpeg");
  }

  #[test]
  fn falls_back_to_octet_stream() {
    assert_eq!(get_content_type(&PathBuf::from("binary.unknown")), "application/octet-stream");
    assert_eq!(get_content_type(&PathBuf::from("no_extension")), "application/octet-stream");
  }
}
