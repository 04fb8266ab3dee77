use core::num::ParseIntError;
use std::path::PathBuf;

use anyhow::Context as _;
use asimage::bevel::Bevel;
use asimage::blend::BlendMode;
use asimage::gradient::{FlipFlags, Gradient, GradientKind, GradientStop};
use asimage::{Argb32, Quality};
use clap::{Parser, ValueEnum};

const BEVEL_HI_COLOR: Argb32 = Argb32(0xFFE0_E0E0);
const BEVEL_LO_COLOR: Argb32 = Argb32(0xFF40_4040);

#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub log_file: Option<String>,
    pub output: PathBuf,
    pub width: usize,
    pub height: usize,
    pub gradient: Gradient,
    pub quality: Quality,
    pub compression: u32,
    pub back_color: Argb32,
    pub panel: Option<Panel>,
}

/// A solid rectangle drawn over the background, inset by `margin` on every side.
#[derive(Clone, Debug)]
pub struct Panel {
    pub color: Argb32,
    pub blend: BlendMode,
    pub margin: usize,
    pub bevel: Option<Bevel>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    LeftToRight,
    TopToBottom,
    TopLeftToBottomRight,
    BottomLeftToTopRight,
}

impl From<Direction> for GradientKind {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::LeftToRight => GradientKind::LeftToRight,
            Direction::TopToBottom => GradientKind::TopToBottom,
            Direction::TopLeftToBottomRight => GradientKind::TopLeftToBottomRight,
            Direction::BottomLeftToTopRight => GradientKind::BottomLeftToTopRight,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum QualityLevel {
    Poor,
    Fast,
    Good,
    Top,
}

impl From<QualityLevel> for Quality {
    fn from(level: QualityLevel) -> Self {
        match level {
            QualityLevel::Poor => Quality::Poor,
            QualityLevel::Fast => Quality::Fast,
            QualityLevel::Good => Quality::Good,
            QualityLevel::Top => Quality::Top,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Blend {
    Alpha,
    Allanon,
    Add,
    Sub,
    Diff,
    Darken,
    Lighten,
    Screen,
}

impl From<Blend> for BlendMode {
    fn from(blend: Blend) -> Self {
        match blend {
            Blend::Alpha => BlendMode::AlphaBlend,
            Blend::Allanon => BlendMode::Allanon,
            Blend::Add => BlendMode::Add,
            Blend::Sub => BlendMode::Sub,
            Blend::Diff => BlendMode::Diff,
            Blend::Darken => BlendMode::Darken,
            Blend::Lighten => BlendMode::Lighten,
            Blend::Screen => BlendMode::Screen,
        }
    }
}

fn parse_hex(input: &str) -> Result<u32, ParseIntError> {
    if input.starts_with("0x") {
        u32::from_str_radix(input.get(2..).unwrap_or(""), 16)
    } else {
        input.parse::<u32>()
    }
}

/// Renders a gradient background, optionally covered by a beveled panel, into a PNG file
#[derive(Parser, Debug)]
#[clap(author = "asimage contributors", about = "asimage renderer")]
#[clap(version, long_about = None)]
struct Args {
    /// A file with renderer logs
    #[clap(short, long, value_parser)]
    log_file: Option<String>,

    /// Where to write the PNG file
    output: PathBuf,

    #[clap(long, value_parser, default_value_t = 256)]
    width: usize,

    #[clap(long, value_parser, default_value_t = 256)]
    height: usize,

    /// Direction of the background gradient
    #[clap(long, value_enum, value_parser, default_value_t = Direction::LeftToRight)]
    kind: Direction,

    /// A gradient color as ARGB, repeat for more stops (`0xFF336699`)
    #[clap(long = "color", value_parser = parse_hex)]
    colors: Vec<u32>,

    /// Rotate the gradient by 90 degrees
    #[clap(long)]
    vertical: bool,

    /// Reverse the gradient
    #[clap(long)]
    upside_down: bool,

    #[clap(long, value_enum, value_parser, default_value_t = QualityLevel::Good)]
    quality: QualityLevel,

    /// Percentage of each row scanned for runs
    #[clap(long, value_parser = clap::value_parser!(u32).range(0..=100), default_value_t = 100)]
    compression: u32,

    /// Color of the canvas where nothing is drawn
    #[clap(long, value_parser = parse_hex, default_value_t = 0xFF00_0000)]
    back_color: u32,

    /// Color of a panel drawn over the background
    #[clap(long, value_parser = parse_hex)]
    panel: Option<u32>,

    /// How the panel is combined with the background
    #[clap(long, value_enum, value_parser, default_value_t = Blend::Alpha)]
    blend: Blend,

    /// Distance between the panel and the canvas edges
    #[clap(long, value_parser, default_value_t = 16)]
    margin: usize,

    /// Outline thickness of the panel bevel
    #[clap(long, value_parser, requires("panel"))]
    bevel: Option<u32>,
}

impl RenderConfig {
    pub fn parse_args() -> anyhow::Result<Self> {
        let args = Args::parse();

        if args.width == 0 || args.height == 0 {
            anyhow::bail!("Invalid canvas size {}x{}", args.width, args.height);
        }

        let colors: Vec<Argb32> = match args.colors.as_slice() {
            [] => vec![Argb32::BLACK, Argb32::WHITE],
            [color] => vec![Argb32(*color); 2],
            colors => colors.iter().copied().map(Argb32).collect(),
        };

        let last = (colors.len() - 1) as f64;
        let stops = colors
            .iter()
            .enumerate()
            .map(|(i, color)| GradientStop::new(*color, i as f64 / last))
            .collect();

        let mut flip = FlipFlags::empty();
        flip.set(FlipFlags::VERTICAL, args.vertical);
        flip.set(FlipFlags::UPSIDE_DOWN, args.upside_down);

        let gradient = Gradient::new(args.kind.into(), stops)
            .context("background gradient")?
            .flip(flip);

        let panel = args.panel.map(|color| Panel {
            color: Argb32(color),
            blend: args.blend.into(),
            margin: args.margin,
            bevel: args
                .bevel
                .map(|outline| Bevel::uniform(BEVEL_HI_COLOR, BEVEL_LO_COLOR, outline, 0)),
        });

        Ok(Self {
            log_file: args.log_file,
            output: args.output,
            width: args.width,
            height: args.height,
            gradient,
            quality: args.quality.into(),
            compression: args.compression,
            back_color: Argb32(args.back_color),
            panel,
        })
    }
}
