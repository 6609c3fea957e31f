// Copyright 2026 the tsls authors. MIT license.

use std::path::Path;
use std::path::PathBuf;

use anyhow::anyhow;
use anyhow::Error as AnyError;
use percent_encoding::percent_decode_str;
use percent_encoding::utf8_percent_encode;
use url::Url;

/// The component percent-encode set from the WHATWG URL spec, matching what
/// `encodeURIComponent()` leaves encoded in a `file://` path segment.
///
/// See: <https://url.spec.whatwg.org/#component-percent-encode-set>
pub const COMPONENT: &percent_encoding::AsciiSet = &percent_encoding::CONTROLS
  .add(b' ')
  .add(b'"')
  .add(b'#')
  .add(b'<')
  .add(b'>')
  .add(b'?')
  .add(b'`')
  .add(b'{')
  .add(b'}')
  .add(b':')
  .add(b';')
  .add(b'=')
  .add(b'@')
  .add(b'[')
  .add(b'\\')
  .add(b']')
  .add(b'^')
  .add(b'|')
  .add(b'$')
  .add(b'%')
  .add(b'&')
  .add(b'+')
  .add(b',');

/// Resolve a `file://` URI to a native filesystem path. Returns `None` for
/// any other scheme; callers short-circuit such requests with an empty
/// response instead of erroring.
pub fn uri_to_path(uri: &Url) -> Option<PathBuf> {
  if uri.scheme() != "file" {
    return None;
  }
  uri.to_file_path().ok().or_else(|| {
    // `Url::to_file_path` refuses URIs with a non-empty host, which some
    // editors produce for UNC-less local paths. Fall back to the decoded
    // path component.
    let decoded = percent_decode_str(uri.path()).decode_utf8().ok()?;
    let path = PathBuf::from(decoded.as_ref());
    path.is_absolute().then_some(path)
  })
}

/// Produce a `file://` URI for an absolute path, percent-encoding each path
/// segment per the component set.
pub fn path_to_uri(path: &Path) -> Result<Url, AnyError> {
  if !path.is_absolute() {
    return Err(anyhow!(
      "cannot convert relative path \"{}\" to a file URI",
      path.display()
    ));
  }
  let mut segments = Vec::new();
  for component in path.components() {
    match component {
      std::path::Component::RootDir => {}
      std::path::Component::Prefix(prefix) => {
        segments.push(prefix.as_os_str().to_string_lossy().into_owned());
      }
      component => {
        let segment = component.as_os_str().to_string_lossy();
        segments
          .push(utf8_percent_encode(segment.as_ref(), COMPONENT).to_string());
      }
    }
  }
  let uri = format!("file:///{}", segments.join("/"));
  Url::parse(&uri)
    .map_err(|err| anyhow!("invalid file URI \"{uri}\": {err}"))
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn file_uri_to_path() {
    let uri = Url::parse("file:///a/b/mod.ts").unwrap();
    assert_eq!(uri_to_path(&uri), Some(PathBuf::from("/a/b/mod.ts")));
  }

  #[test]
  fn non_file_scheme_is_none() {
    let uri = Url::parse("untitled:Untitled-1").unwrap();
    assert_eq!(uri_to_path(&uri), None);
    let uri = Url::parse("https://example.com/mod.ts").unwrap();
    assert_eq!(uri_to_path(&uri), None);
  }

  #[test]
  fn path_round_trip() {
    let cases = ["/a/b/mod.ts", "/with space/file.ts", "/päth/mod.tsx"];
    for case in cases {
      let uri = path_to_uri(Path::new(case)).unwrap();
      assert_eq!(uri.scheme(), "file");
      assert_eq!(uri_to_path(&uri), Some(PathBuf::from(case)), "{case}");
    }
  }

  #[test]
  fn encodes_component_set() {
    let uri = path_to_uri(Path::new("/a b/c#d.ts")).unwrap();
    assert_eq!(uri.as_str(), "file:///a%20b/c%23d.ts");
  }

  #[test]
  fn relative_path_errors() {
    assert!(path_to_uri(Path::new("relative/mod.ts")).is_err());
  }

  #[test]
  fn uri_round_trip() {
    let uri = Url::parse("file:///a%20b/m%C3%B6d.ts").unwrap();
    let path = uri_to_path(&uri).unwrap();
    assert_eq!(path_to_uri(&path).unwrap(), uri);
  }
}
