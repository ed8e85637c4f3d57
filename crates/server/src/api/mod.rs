mod artifacts;
mod handlers;
mod middleware;
mod routes;
mod workflow;

pub use routes::create_router;
