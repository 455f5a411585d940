pub mod method;
pub mod request;
pub mod response;

pub use method::Method;
pub use request::{LOGIN_REQUEST_ID, LoginParams, Request, SubmitParams};
pub use response::Response;
