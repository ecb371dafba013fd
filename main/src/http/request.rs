use super::HEADER_TERMINATOR;
use super::LINE_TERMINATOR;
use std::collections::HashMap;

/// A parsed request. Header names are stored in lower case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: Default::default(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Parses everything received so far on a connection.
    ///
    /// Returns `None` for input that is not UTF-8 or lacks a method and a path.
    pub fn parse(buffer: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(buffer).ok()?;
        let mut lines = text.split(LINE_TERMINATOR);

        let mut request_line = lines.next()?.split_whitespace();
        let method = request_line.next()?;
        let target = request_line.next()?;
        let path = target.split('?').next().unwrap_or(target);

        let headers = lines
            .take_while(|line| !line.is_empty())
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
            .collect();

        let body = text
            .split_once(HEADER_TERMINATOR)
            .map(|(_, body)| body.as_bytes().to_vec());

        Some(Self {
            method: method.to_string(),
            path: path.to_string(),
            headers,
            body,
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Wire form of the request, used by clients of the chat server.
    ///
    /// A `Content-Length` header is added whenever there is a body.
    pub fn serialize(&self) -> Vec<u8> {
        let mut head = format!("{} {} HTTP/1.1{}", self.method, self.path, LINE_TERMINATOR);
        let mut names: Vec<_> = self.headers.keys().collect();
        names.sort();
        for name in names {
            if name == "content-length" {
                continue;
            }
            head.push_str(&format!("{}: {}{}", name, self.headers[name], LINE_TERMINATOR));
        }
        if let Some(body) = &self.body {
            head.push_str(&format!("content-length: {}{}", body.len(), LINE_TERMINATOR));
        }
        head.push_str(LINE_TERMINATOR);

        let mut bytes = head.into_bytes();
        if let Some(body) = &self.body {
            bytes.extend_from_slice(body);
        }
        bytes
    }
}
