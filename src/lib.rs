pub mod config;
pub mod control;
pub mod motor;
pub mod perception;
pub mod runtime;
pub mod telemetry;
