pub(crate) mod config;
pub(crate) mod cors;
pub(crate) mod os;
pub(crate) mod telemetry;
