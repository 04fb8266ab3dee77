#![doc = include_str!("../README.md")]
#![allow(unused_crate_dependencies)] // false positives because there is both a library and a binary

// No need to be as strict as in production libraries
#![allow(clippy::as_conversions)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

#[macro_use]
extern crate tracing;

pub mod config;
pub mod render;
