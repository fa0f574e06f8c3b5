//! Request and response transformation between the client dialects and the
//! backend SPI.

pub mod params;
pub mod request;
pub mod response;

pub use params::transform_parameter_value;
pub use request::{
    add_message_field, extract_request_id, transform_rest_request, transform_rpc_request,
    update_from_body,
};
pub use response::{
    error_response, finish_rpc_response, rest_error_response, rpc_error_response,
    transform_rest_response, transform_rpc_response,
};
