//! connectome-ksample - nonparametric K-sample testing for mouse connectomes
//!
//! This library provides permutation-based K-sample tests (MGC, Dcorr, Hsic),
//! a block simulation sweep for estimating power, omnibus embedding of graph
//! collections, per-vertex testing with Holm correction, and block
//! aggregation of connectome edge weights.

pub mod aggregate;
pub mod cli;
pub mod compare;
pub mod config;
pub mod correction;
pub mod csv_output;
pub mod dataset;
pub mod embed;
pub mod ksample;
pub mod plot;
pub mod progress;
pub mod simulation;
pub mod table;
pub mod vertex;
