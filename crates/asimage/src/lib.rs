#![cfg_attr(doc, doc = include_str!("../README.md"))]
#![allow(clippy::as_conversions)] // FIXME: remove
#![allow(clippy::cast_lossless)] // FIXME: remove
#![allow(clippy::cast_possible_truncation)] // FIXME: remove
#![allow(clippy::cast_possible_wrap)] // FIXME: remove
#![allow(clippy::cast_precision_loss)] // FIXME: remove
#![allow(clippy::cast_sign_loss)] // FIXME: remove

#[macro_use]
extern crate tracing;

pub mod bevel;
pub mod blend;
pub mod color;
pub mod context;
pub mod convert;
pub mod decoder;
pub mod error;
pub mod gradient;
pub mod image;
pub mod layer;
pub mod native;
pub mod output;
pub mod quantize;
pub mod registry;
pub mod rle;
pub mod scanline;
pub mod text;

pub use self::color::{Argb32, Channel, ChannelFlags};
pub use self::context::{Config, Context, Quality};
pub use self::decoder::ImageDecoder;
pub use self::error::ImageError;
pub use self::image::AsImage;
pub use self::layer::{merge_layers, ImageLayer};
pub use self::output::{ImageOutput, OutputFormat};
pub use self::scanline::Scanline;
