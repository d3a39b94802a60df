pub mod check;
pub mod client;
pub mod errors;
pub mod gateway;
pub mod ids;
pub mod runtime;
pub mod workflow;
