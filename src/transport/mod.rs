mod http_transport;

pub use http_transport::{build_request_headers, HttpTransport};
