pub mod analyzers;
pub mod annotate;
pub mod output;
pub mod parser;
pub mod stats;
pub mod telemetry;
