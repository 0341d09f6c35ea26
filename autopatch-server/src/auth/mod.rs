pub mod middleware;

pub use middleware::{CurrentUser, bearer_token, gate_middleware, session_middleware};
