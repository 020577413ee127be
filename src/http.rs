//! Minimal HTTP surface: parse one request line, render one response.
//!
//! The only route is `GET /files?name=<filename>`. Everything a client
//! can get back is either a `200 OK` header followed by file bytes, or
//! one of four pre-rendered error responses. Response bodies are fixed
//! byte strings; clients may depend on their exact text.

/// A request must fit into one read of this many bytes. Whatever arrives
/// past the first line is ignored; a request split across reads is not
/// reassembled and parses as garbage.
pub const MAX_REQUEST_BYTES: usize = 2048;

/// Longest accepted filename, in bytes.
pub const MAX_FILENAME_BYTES: usize = 255;

pub const RESPONSE_BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\r\n\
Content-Type: text/plain\r\n\
Content-Length: 13\r\n\
Connection: close\r\n\
\r\n\
Bad request\r\n";

pub const RESPONSE_FORBIDDEN: &[u8] = b"HTTP/1.1 403 Forbidden\r\n\
Content-Type: text/plain\r\n\
Content-Length: 15\r\n\
Connection: close\r\n\
\r\n\
Access denied\r\n";

pub const RESPONSE_NOT_FOUND: &[u8] = b"HTTP/1.1 404 Not Found\r\n\
Content-Type: text/plain\r\n\
Content-Length: 16\r\n\
Connection: close\r\n\
\r\n\
File not found\r\n";

pub const RESPONSE_INTERNAL_ERROR: &[u8] = b"HTTP/1.1 500 Internal Server Error\r\n\
Content-Type: text/plain\r\n\
Content-Length: 23\r\n\
Connection: close\r\n\
\r\n\
Internal server error\r\n";

/// Everything that terminates a request with an error status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    BadRequest,
    Forbidden,
    NotFound,
    InternalError,
}

impl HttpError {
    pub fn status(self) -> u16 {
        match self {
            HttpError::BadRequest => 400,
            HttpError::Forbidden => 403,
            HttpError::NotFound => 404,
            HttpError::InternalError => 500,
        }
    }

    /// The complete, correctly framed response for this error.
    pub fn response(self) -> &'static [u8] {
        match self {
            HttpError::BadRequest => RESPONSE_BAD_REQUEST,
            HttpError::Forbidden => RESPONSE_FORBIDDEN,
            HttpError::NotFound => RESPONSE_NOT_FOUND,
            HttpError::InternalError => RESPONSE_INTERNAL_ERROR,
        }
    }
}

/// Header for a successful file transfer; the body follows via sendfile.
pub fn ok_header(content_length: u64) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: {content_length}\r\n\
         Connection: close\r\n\
         \r\n"
    )
    .into_bytes()
}

/// Parse a raw request buffer down to the filename to serve.
///
/// Only the first line is looked at:
/// - fewer than two whitespace-delimited tokens → 400
/// - method other than exactly `GET` → 403
/// - URI not starting with `/files?` → 404
/// - missing or empty `name=` value → 400
/// - name longer than [`MAX_FILENAME_BYTES`], or containing `..`, `/`
///   or `\` → 400 (only flat filenames inside the base directory are
///   servable)
pub fn parse_request(buf: &[u8]) -> Result<&str, HttpError> {
    let line = match buf.iter().position(|&b| b == b'\n') {
        Some(end) => &buf[..end],
        None => buf,
    };
    let line = std::str::from_utf8(line).map_err(|_| HttpError::BadRequest)?;

    let mut tokens = line.split_whitespace();
    let method = tokens.next().ok_or(HttpError::BadRequest)?;
    let uri = tokens.next().ok_or(HttpError::BadRequest)?;

    if method != "GET" {
        return Err(HttpError::Forbidden);
    }
    let query = uri.strip_prefix("/files?").ok_or(HttpError::NotFound)?;

    // First `name=` key anywhere in the query; value runs to `&` or end.
    let value = match query.find("name=") {
        Some(at) => {
            let rest = &query[at + "name=".len()..];
            rest.split('&').next().unwrap_or("")
        }
        None => "",
    };

    if value.is_empty()
        || value.len() > MAX_FILENAME_BYTES
        || value.contains("..")
        || value.contains('/')
        || value.contains('\\')
    {
        return Err(HttpError::BadRequest);
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        let buf = b"GET /files?name=hello.txt HTTP/1.1\r\nHost: x\r\n\r\n";
        assert_eq!(parse_request(buf), Ok("hello.txt"));
    }

    #[test]
    fn test_name_ends_at_ampersand() {
        let buf = b"GET /files?name=a.txt&pretty=1 HTTP/1.1\r\n\r\n";
        assert_eq!(parse_request(buf), Ok("a.txt"));
    }

    #[test]
    fn test_name_after_other_parameter() {
        let buf = b"GET /files?cache=0&name=b.txt HTTP/1.1\r\n\r\n";
        assert_eq!(parse_request(buf), Ok("b.txt"));
    }

    #[test]
    fn test_too_few_tokens() {
        assert_eq!(parse_request(b"GET\r\n"), Err(HttpError::BadRequest));
        assert_eq!(parse_request(b"\r\n"), Err(HttpError::BadRequest));
        assert_eq!(parse_request(b""), Err(HttpError::BadRequest));
    }

    #[test]
    fn test_non_utf8_line() {
        assert_eq!(
            parse_request(b"\xff\xfe\xfd more"),
            Err(HttpError::BadRequest)
        );
    }

    #[test]
    fn test_non_get_method() {
        let buf = b"POST /files?name=a.txt HTTP/1.1\r\n\r\n";
        assert_eq!(parse_request(buf), Err(HttpError::Forbidden));
        // Exact match is required; a GET prefix is not enough.
        let buf = b"GETX /files?name=a.txt HTTP/1.1\r\n\r\n";
        assert_eq!(parse_request(buf), Err(HttpError::Forbidden));
    }

    #[test]
    fn test_unknown_path() {
        let buf = b"GET /other HTTP/1.1\r\n\r\n";
        assert_eq!(parse_request(buf), Err(HttpError::NotFound));
        let buf = b"GET /files HTTP/1.1\r\n\r\n";
        assert_eq!(parse_request(buf), Err(HttpError::NotFound));
    }

    #[test]
    fn test_missing_or_empty_name() {
        for raw in [
            &b"GET /files?foo=bar HTTP/1.1\r\n\r\n"[..],
            &b"GET /files?name= HTTP/1.1\r\n\r\n"[..],
            &b"GET /files?name=&x=1 HTTP/1.1\r\n\r\n"[..],
            &b"GET /files? HTTP/1.1\r\n\r\n"[..],
        ] {
            assert_eq!(parse_request(raw), Err(HttpError::BadRequest));
        }
    }

    #[test]
    fn test_traversal_and_nesting_rejected() {
        for name in ["..", "../etc/passwd", "a/../b", "dir/file.txt", "dir\\file.txt"] {
            let raw = format!("GET /files?name={name} HTTP/1.1\r\n\r\n");
            assert_eq!(
                parse_request(raw.as_bytes()),
                Err(HttpError::BadRequest),
                "name {name:?} must be rejected"
            );
        }
    }

    #[test]
    fn test_overlong_name_rejected() {
        let name = "a".repeat(MAX_FILENAME_BYTES + 1);
        let raw = format!("GET /files?name={name} HTTP/1.1\r\n\r\n");
        assert_eq!(parse_request(raw.as_bytes()), Err(HttpError::BadRequest));

        let name = "a".repeat(MAX_FILENAME_BYTES);
        let raw = format!("GET /files?name={name} HTTP/1.1\r\n\r\n");
        assert!(parse_request(raw.as_bytes()).is_ok());
    }

    #[test]
    fn test_error_responses_are_correctly_framed() {
        for err in [
            HttpError::BadRequest,
            HttpError::Forbidden,
            HttpError::NotFound,
            HttpError::InternalError,
        ] {
            let text = std::str::from_utf8(err.response()).unwrap();
            let (head, body) = text.split_once("\r\n\r\n").unwrap();
            assert!(head.starts_with(&format!("HTTP/1.1 {}", err.status())));
            assert!(head.contains("Content-Type: text/plain"));
            assert!(head.contains("Connection: close"));
            assert!(head.contains(&format!("Content-Length: {}", body.len())));
            assert!(body.ends_with("\r\n"));
        }
    }

    #[test]
    fn test_ok_header() {
        let header = String::from_utf8(ok_header(42)).unwrap();
        assert!(header.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(header.contains("Content-Length: 42\r\n"));
        assert!(header.contains("Connection: close\r\n"));
        assert!(header.ends_with("\r\n\r\n"));
    }
}
