//! MonkeyGen: NFT character variations from a single base image.
//!
//! A base image gets one style analysis, then every variation is an image
//! edit with freshly sampled traits. Runs are sequential and a failed
//! variation never stops the run.

#![allow(clippy::multiple_crate_versions)]
#![deny(clippy::all)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::complexity)]
#![deny(clippy::correctness)]
#![deny(clippy::disallowed_methods)]
#![deny(clippy::expect_used)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::panic)]
#![deny(clippy::perf)]
#![deny(clippy::trivially_copy_pass_by_ref)]
#![deny(clippy::unreachable)]
#![deny(clippy::unwrap_used)]
#![deny(warnings)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod base_image;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod gallery;
pub mod openai;
pub mod orchestrator;
pub mod prompt;
pub mod studio;
pub mod style;
pub mod trait_pool;
pub mod web;
