#![forbid(unsafe_code)]

mod client;
mod error;
mod estimate;
mod types;
mod util;

pub use client::{DEFAULT_CONNECT_TIMEOUT, HttpClient};
pub use error::{Error, HttpTransportErrorKind, Result};
pub use types::{HttpRequest, HttpResponse};
pub use util::validate_target_url;
