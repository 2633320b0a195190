//! Candidate extraction: the heuristic catalogue (C5) and the embedding
//! similarity search (C6). Both produce [`crate::model::Candidate`] lists
//! over the same message set; [`crate::merge`] reconciles them.

pub mod heuristic;
pub mod semantic;
