//! HTTP transport: one reqwest client per named binding, with response
//! classification into the transient / non-transient fault taxonomy.

pub mod classification;
pub mod http;

pub use classification::{StatusClass, TransientStatuses};
pub use http::{HttpRequest, HttpResponse, HttpTransport, TransportConfig, REQUEST_ID_HEADER};
