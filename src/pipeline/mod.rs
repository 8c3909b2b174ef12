//! Offline jobs: raw CSV to processed table, processed table to model artifact.

pub mod csv;
pub mod etl;
pub mod training;

pub use etl::{EtlJob, EtlReport, EtlSource};
pub use training::{Trainer, TrainingReport};
