pub mod client;
pub mod constants;
pub mod node;
pub mod pod;
pub mod printer;
pub mod selector;
pub mod telemetry;
