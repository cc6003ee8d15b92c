//! The per-request pipeline: guards, parameter pipes, the handler call and
//! exception filters.

mod context;
pub(crate) mod executor;
mod filter;
mod guard;
mod handler;
mod middleware;
mod pipe;

pub use {
    context::{InboundRequest, Invocation, Next, RequestContext, ResponseHandle},
    filter::Filter,
    guard::Guard,
    handler::{Handler, Reply},
    middleware::Middleware,
    pipe::{Pipe, PipeMetadata},
};
