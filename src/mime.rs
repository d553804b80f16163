//! Content-Type lookup by file extension.


const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Map a file extension (without the leading dot, any case) to a MIME type.
/// Unknown extensions fall back to `application/octet-stream`.
pub fn by_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "txt"          => "text/plain",
        "css"          => "text/css",
        "csv"          => "text/csv",
        "js"           => "application/javascript",
        "json"         => "application/json",
        "pdf"          => "application/pdf",
        "xml"          => "application/xml",
        "png"          => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif"          => "image/gif",
        "svg"          => "image/svg+xml",
        "ico"          => "image/x-icon",
        _              => DEFAULT_MIME_TYPE,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(by_extension("html"), "text/html");
        assert_eq!(by_extension("htm"), "text/html");
        assert_eq!(by_extension("jpg"), "image/jpeg");
        assert_eq!(by_extension("json"), "application/json");
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(by_extension("HTML"), "text/html");
        assert_eq!(by_extension("Png"), "image/png");
    }

    #[test]
    fn unknown_extension_falls_back_to_octet_stream() {
        assert_eq!(by_extension("xyz"), "application/octet-stream");
        assert_eq!(by_extension(""), "application/octet-stream");
    }
}
