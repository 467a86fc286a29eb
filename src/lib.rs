pub mod ai;
pub mod codegen;
pub mod config;
pub mod credentials;
pub mod error;
pub mod platform;
pub mod server;
pub mod shutdown;
pub mod workflow;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_support;
