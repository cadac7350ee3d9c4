pub mod handlers;
pub mod owner;
pub mod range;
pub mod response;
mod routes;

pub use routes::create_router;
