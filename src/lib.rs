//! Roster ingestion and grading core for the classroom sidecar.
//!
//! Both halves are pure and synchronous: [`roster`] turns delimited text into
//! validated student records, [`scoring`] computes answer-key and rubric
//! grades. Neither module touches storage or the IPC layer.

pub mod roster;
pub mod scoring;
