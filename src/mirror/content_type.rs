//! Content type to file extension mapping

/// Content type assumed when the upstream sends none
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Extension used when the content type has no usable subtype
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Declared content type, defaulting to `image/jpeg` when absent or blank
pub fn effective_content_type(header: Option<&str>) -> &str {
    match header.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// File extension for a content type
///
/// Takes everything after the first `/` verbatim. Parameters are not
/// stripped and structured suffixes are kept, so `image/svg+xml` maps to
/// `svg+xml`.
pub fn extension_for(header: Option<&str>) -> &str {
    effective_content_type(header)
        .split('/')
        .nth(1)
        .filter(|subtype| !subtype.is_empty())
        .unwrap_or(DEFAULT_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_maps_to_png() {
        assert_eq!(extension_for(Some("image/png")), "png");
    }

    #[test]
    fn missing_header_defaults_to_jpg() {
        assert_eq!(extension_for(None), "jpg");
        assert_eq!(effective_content_type(None), "image/jpeg");
    }

    #[test]
    fn blank_header_defaults_to_jpeg() {
        assert_eq!(effective_content_type(Some("  ")), "image/jpeg");
        assert_eq!(extension_for(Some("")), "jpg");
    }

    #[test]
    fn malformed_header_defaults_to_jpg() {
        assert_eq!(extension_for(Some("image")), "jpg");
        assert_eq!(extension_for(Some("image/")), "jpg");
    }

    #[test]
    fn structured_suffix_is_kept_verbatim() {
        assert_eq!(extension_for(Some("image/svg+xml")), "svg+xml");
    }

    #[test]
    fn parameters_are_not_stripped() {
        assert_eq!(
            extension_for(Some("image/webp; charset=binary")),
            "webp; charset=binary"
        );
    }
}
