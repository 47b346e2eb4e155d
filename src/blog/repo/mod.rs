//! Table-level access. Every function takes a `&Connection`, so callers
//! pass either the raw connection or an open transaction (which derefs to
//! one) and the statement joins the caller's unit of work.

pub mod archives;
pub mod articles;
pub mod comments;
pub mod pages;
pub mod statistic;
pub mod tags;
