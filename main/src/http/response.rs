use super::LINE_TERMINATOR;
use serde::Serialize;

/// A response built by a handler.
///
/// `Content-Length` and `Connection` are owned by the serializer and cannot be
/// set through [`HttpResponse::with_header`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status_code: u16,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl HttpResponse {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            headers: Vec::default(),
            body: None,
        }
    }

    pub fn html(html: &str) -> Self {
        Self::new(200)
            .with_header("Content-Type", "text/html; charset=utf-8")
            .with_body(html)
    }

    /// A 200 response with a JSON body, or a 500 if the value cannot be encoded.
    pub fn json(value: &impl Serialize) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(200)
                .with_header("Content-Type", "application/json")
                .with_body(body),
            Err(e) => {
                log::error!("Failed to encode a JSON response: {}", e);
                Self::text(500, "Internal Server Error")
            }
        }
    }

    pub fn text(status_code: u16, text: &str) -> Self {
        Self::new(status_code)
            .with_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(text)
    }

    pub fn not_found() -> Self {
        Self::text(404, "Not Found")
    }

    pub fn bad_request() -> Self {
        Self::text(400, "Bad Request")
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if is_reserved_header(name) {
            log::debug!("Ignoring reserved response header `{}`", name);
            return self;
        }
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let body = self.body.as_deref().unwrap_or_default();
        let mut head = format!(
            "HTTP/1.1 {} {}{}",
            self.status_code,
            reason_phrase(self.status_code),
            LINE_TERMINATOR
        );
        head.push_str(&format!("Content-Length: {}{}", body.len(), LINE_TERMINATOR));
        head.push_str(&format!("Connection: close{}", LINE_TERMINATOR));
        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}{}", name, value, LINE_TERMINATOR));
        }
        head.push_str(LINE_TERMINATOR);

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(body);
        bytes
    }
}

fn is_reserved_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("Content-Length") || name.eq_ignore_ascii_case("Connection")
}

fn reason_phrase(status_code: u16) -> &'static str {
    match status_code {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
