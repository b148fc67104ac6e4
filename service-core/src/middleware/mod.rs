pub mod request_context;

pub use request_context::{
    REQUEST_ID_HEADER, http_metrics_middleware, http_request_span, request_id_middleware,
};
