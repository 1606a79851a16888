//! The HTTP/1.1 wire format: request parsing, response serialisation, and
//! the multipart/form-data sub-parser, layered on top of [`crate::wire`].

mod multipart;
mod request;
mod response;

pub use multipart::UploadedFile;
pub use request::{parse_request, Method, Request};
pub use response::{Response, SetCookie, TransferMode};
