pub mod error;
pub mod guidance;
pub mod heuristic;
pub mod http;
pub mod kit;
mod lenient;
pub mod normalize;
pub mod oracle;
pub mod prep;
pub mod prompt;
pub mod reply;
pub mod store;
pub mod types;
pub mod voice;

#[cfg(test)]
mod testing;

pub use error::*;
pub use types::*;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
