//! Request-scoped middleware

pub mod rate_limit;
pub mod request_id;

pub use rate_limit::enforce_rate_limit;
pub use request_id::{REQUEST_ID_HEADER, RequestId, attach_request_id};
