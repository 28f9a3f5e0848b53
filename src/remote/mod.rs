//! Remote todo service: the HTTP-shaped request model, the transport seam, and
//! the `reqwest` transport used in production.

mod client;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::RemoteClient;
pub use transport::{http_date, ApiRequest, ApiResponse, Transport};
