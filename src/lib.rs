//! # pgm-abw - Robust available bandwidth estimation from probe-gap measurements
//!
//! This library estimates the available bandwidth (ABW) of network links from
//! probe-pair measurements collected during emulation experiments.
//!
//! ## Overview
//!
//! Every measurement records the ingress gap `gin`, the egress gap `gout` and
//! the payload length `len` of a probe packet pair. Under the probe-gap model
//! the gap-dilation ratio `gout/gin` grows linearly with the probing rate
//! `len/gin` once the rate exceeds the available bandwidth, so a line fitted
//! to the samples of one link observation crosses `gout/gin = 1` at the ABW.
//!
//! ## Architecture
//!
//! - `config`: typed YAML configuration (capacity table, estimator and
//!   selection settings)
//! - `config_loader`: configuration loading and CLI overrides
//! - `store`: measurement store trait, JSON dumps, compressed snapshots and
//!   candidate marking
//! - `estimation`: grouping, robust regression, bounds sanitizing, the
//!   per-experiment pipeline and reports
//! - `synth`: synthetic probe-gap measurements
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use pgm_abw::{config_loader, estimation, store};
//!
//! let config = config_loader::load_config(Path::new("config.yaml"))?;
//! let store = store::open_store(Path::new("measurements.json"))?
//!     .with_recomputed_candidates(config.selection.recompute_candidates);
//!
//! let estimator = estimation::Estimator::from_config(&config.estimator);
//! let estimates = estimation::estimate_experiment(&store, &config, &estimator, "exp2")?;
//! for link in &estimates.links {
//!     println!("{}: {:?}", link.link_state_id, link.estimated_abw_bits());
//! }
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! estimator:
//!   method: robust      # or ols
//!   workers: 0          # 0 = all cores
//!   max_iterations: 100
//!   tolerance: 1.0e-8
//!
//! selection:
//!   probe_packet_size: 1362
//!   min_confidence: 0.1
//!   recompute_candidates: false
//!
//! experiments:
//!   exp2:
//!     capacity: 3000000       # bit/s
//!     max_capacity: 5000000   # bit/s
//! ```
//!
//! ## Error Handling
//!
//! Library errors are typed with `thiserror`; file and CLI layers return
//! `color_eyre::Result` with context attached.

pub mod config;
pub mod config_loader;
pub mod estimation;
pub mod store;
pub mod synth;
