mod data;
mod domain;
mod http;
mod visitor;

pub(crate) use data::Repository;
pub(crate) use domain::{CommandError, Store};
pub(crate) use http::router;
