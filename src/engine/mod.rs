//! Crawl engine: worker pool, dispatchers, HTTP access and CLI entry points.

pub mod arg_parser;
pub mod avatar;
pub mod cancel;
pub mod cli;
pub mod dispatcher;
pub mod fetch;
pub mod frontier;
pub mod pool;
pub mod worker;

pub use arg_parser::Cli;
pub use avatar::{AvatarWorker, build_inventory, resolve_avatar_target};
pub use cancel::CancelToken;
pub use cli::handle_run;
pub use dispatcher::run_dispatcher;
pub use fetch::{Fetch, HttpFetcher};
pub use frontier::{Frontier, FrontierPusher, frontier_pair};
pub use pool::{Counters, Pool};
pub use worker::FetchWorker;
