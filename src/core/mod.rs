//! Core business logic - framework-agnostic operations over plans and their members.
//!
//! Every function takes a database connection and the acting user's id and returns
//! [`crate::errors::Result`]; the HTTP layer only translates requests and errors.

pub mod category_limit;
pub mod expense;
pub mod invitation;
pub mod membership;
pub mod notification;
pub mod plan;
pub mod report;
pub mod user;
