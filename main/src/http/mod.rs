//! Minimal HTTP/1.1 message handling on top of raw byte buffers.

mod request;
mod response;

pub use request::HttpRequest;
pub use response::HttpResponse;

const LINE_TERMINATOR: &str = "\r\n";
const HEADER_TERMINATOR: &str = "\r\n\r\n";
