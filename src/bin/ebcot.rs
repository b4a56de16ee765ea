//! ebcot CLI - exercises the EBCOT block coder and layer former on
//! synthetic coefficients.

use clap::{Parser, Subcommand};

use ebcot_rs::jpeg2000::bit_plane_coder::{decode_code_block, encode_code_block};
use ebcot_rs::{
    BandLayout, CodeBlock, CodeBlockGeometry, CodeBlockStyle, LayerTarget, RateControl, SampleData,
    SubbandOrientation, TileCodingParameters, TileDecoder, TileEncoder, TileLayout,
};

/// EBCOT entropy coder playground
#[derive(Parser)]
#[command(name = "ebcot")]
#[command(version)]
#[command(about = "Encode and decode synthetic JPEG 2000 code-blocks", long_about = None)]
#[command(after_help = "EXAMPLES:
    ebcot roundtrip -w 64 -H 64 --style 0x3f
    ebcot layers --blocks 8 --budget 400 --budget 1200
    ebcot styles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode one random block, print its pass table and decode it back
    #[command(visible_alias = "r")]
    Roundtrip {
        #[arg(short, long, default_value = "64")]
        width: u32,

        #[arg(short = 'H', long, default_value = "64")]
        height: u32,

        /// Largest sample magnitude
        #[arg(short, long, default_value = "1000")]
        range: i32,

        /// Code-block style byte (hex with 0x prefix or decimal)
        #[arg(short, long, default_value = "0", value_parser = parse_style)]
        style: u8,

        #[arg(long, default_value = "1")]
        seed: u32,
    },

    /// Build a synthetic tile, form layers under byte budgets and decode
    /// every layer prefix
    #[command(visible_alias = "l")]
    Layers {
        /// Number of 32x32 code-blocks
        #[arg(short, long, default_value = "6")]
        blocks: usize,

        /// Cumulative byte budget of a layer; repeat for more layers. A
        /// final lossless layer is always added.
        #[arg(long)]
        budget: Vec<usize>,

        #[arg(short, long, default_value = "0", value_parser = parse_style)]
        style: u8,

        #[arg(long, default_value = "7")]
        seed: u32,
    },

    /// Round-trip one block through every code-block style
    #[command(visible_alias = "s")]
    Styles {
        #[arg(short, long, default_value = "32")]
        size: u32,
    },
}

fn parse_style(s: &str) -> Result<u8, String> {
    let value = match s.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|e| e.to_string())?;
    CodeBlockStyle::from_bits(value).map_err(|e| e.to_string())?;
    Ok(value)
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Roundtrip {
            width,
            height,
            range,
            style,
            seed,
        } => roundtrip(width, height, range, style, seed),
        Commands::Layers {
            blocks,
            budget,
            style,
            seed,
        } => layers(blocks, &budget, style, seed),
        Commands::Styles { size } => styles(size),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn lcg(seed: &mut u32) -> u32 {
    *seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
    *seed >> 8
}

// Laplacian-ish samples: most small, a few large, like wavelet detail bands.
fn synthetic_samples(count: usize, range: i32, seed: &mut u32) -> Vec<i32> {
    let range = range.max(1) as u32;
    (0..count)
        .map(|_| {
            let r = lcg(seed);
            let magnitude = (r % (range + 1)) >> (lcg(seed) % 6);
            if r & 1 == 0 { magnitude as i32 } else { -(magnitude as i32) }
        })
        .collect()
}

fn max_bit_planes(range: i32) -> u8 {
    (32 - (range.max(1) as u32).leading_zeros()) as u8
}

fn roundtrip(
    width: u32,
    height: u32,
    range: i32,
    style: u8,
    mut seed: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let style = CodeBlockStyle::from_bits(style)?;
    let geometry = CodeBlockGeometry::with_size(width, height);
    geometry.validate()?;
    let samples = synthetic_samples(geometry.area(), range, &mut seed);
    let block = CodeBlock::reversible(
        geometry,
        SubbandOrientation::HL,
        samples.clone(),
        max_bit_planes(range),
    )?;

    let encoded = encode_code_block(&block, style)?;
    println!(
        "{}x{} block, style {:#04x}: {} bit-planes, {} passes, {} bytes",
        width,
        height,
        style.bits(),
        encoded.num_bit_planes,
        encoded.passes.len(),
        encoded.data.len()
    );
    println!("{:>5} {:>6} {:>12} {:>8} {:>14} {:>5}", "pass", "plane", "kind", "rate", "distortion", "term");
    for (i, pass) in encoded.passes.iter().enumerate() {
        println!(
            "{:>5} {:>6} {:>12} {:>8} {:>14.1} {:>5}",
            i,
            pass.bit_plane,
            format!("{:?}", pass.kind),
            pass.rate,
            pass.distortion,
            if pass.terminated { "yes" } else { "" }
        );
    }

    let decoded = decode_code_block(&encoded, style, encoded.passes.len())?;
    if decoded.coefficients != samples {
        return Err("decoded block differs from the input".into());
    }
    println!("✓ Lossless round trip");
    Ok(())
}

fn layers(
    count: usize,
    budgets: &[usize],
    style: u8,
    mut seed: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let style = CodeBlockStyle::from_bits(style)?;
    let orientations = [
        SubbandOrientation::HL,
        SubbandOrientation::LH,
        SubbandOrientation::HH,
    ];
    let range = 600;
    let mut blocks = Vec::with_capacity(count);
    for i in 0..count {
        let samples = synthetic_samples(32 * 32, range, &mut seed);
        blocks.push(CodeBlock::reversible(
            CodeBlockGeometry::with_size(32, 32),
            orientations[i % 3],
            samples,
            max_bit_planes(range),
        )?);
    }

    // One band per orientation, each a single row of blocks.
    let mut bands = Vec::new();
    let mut order = Vec::with_capacity(count);
    for orientation in orientations {
        let members: Vec<usize> = (0..count).filter(|i| blocks[*i].orientation == orientation).collect();
        if members.is_empty() {
            continue;
        }
        let mut band = BandLayout::new(orientation, members.len(), 1, max_bit_planes(range), 0);
        band.blocks = members.clone();
        order.extend(members);
        bands.push(band);
    }
    let layout = TileLayout::single_precinct(bands);

    let mut targets: Vec<LayerTarget> = budgets.iter().map(|&b| LayerTarget::Bytes(b)).collect();
    targets.push(LayerTarget::Lossless);
    let parameters = TileCodingParameters {
        style,
        rate_control: RateControl::with_layers(targets),
    };
    let tile = TileEncoder::new(parameters)?.encode(&layout, &blocks)?;

    let geometries = blocks.iter().map(|b| b.geometry).collect();
    let decoder = TileDecoder::new(style, layout, geometries)?;
    println!("{:>5} {:>12} {:>10} {:>12} {:>14}", "layer", "threshold", "rate", "packets", "mse");
    for layer in 0..tile.allocation.num_layers() {
        let bytes = tile.layer_bytes(layer + 1);
        let decoded = decoder.decode_layers(&bytes, layer + 1)?;
        let mut squared_error = 0f64;
        for &i in &order {
            let SampleData::Reversible(samples) = &blocks[i].samples else {
                continue;
            };
            let block = decoded.blocks[i].as_ref().map_err(|e| e.to_string())?;
            for (a, b) in samples.iter().zip(&block.coefficients) {
                squared_error += ((a - b) as f64).powi(2);
            }
        }
        println!(
            "{:>5} {:>12.4} {:>10} {:>12} {:>14.3}",
            layer,
            tile.allocation.thresholds[layer],
            tile.allocation.layer_rates[layer],
            bytes.len(),
            squared_error / (count * 32 * 32) as f64
        );
        if layer + 1 == tile.allocation.num_layers() && squared_error != 0.0 {
            return Err("last layer is not lossless".into());
        }
    }
    println!("✓ {} layers decoded", tile.allocation.num_layers());
    Ok(())
}

fn styles(size: u32) -> Result<(), Box<dyn std::error::Error>> {
    let mut seed = 3;
    let geometry = CodeBlockGeometry::with_size(size, size);
    geometry.validate()?;
    let samples = synthetic_samples(geometry.area(), 4000, &mut seed);
    let block = CodeBlock::reversible(geometry, SubbandOrientation::HH, samples.clone(), 13)?;

    let mut failures = 0;
    for style in CodeBlockStyle::all() {
        let encoded = encode_code_block(&block, style)?;
        let decoded = decode_code_block(&encoded, style, encoded.passes.len())?;
        let ok = decoded.coefficients == samples && decoded.is_complete();
        if !ok {
            failures += 1;
        }
        println!(
            "style {:#04x}: {:>6} bytes, {:>3} passes {}",
            style.bits(),
            encoded.data.len(),
            encoded.passes.len(),
            if ok { "✓" } else { "✗" }
        );
    }
    if failures > 0 {
        return Err(format!("{} styles failed to round-trip", failures).into());
    }
    Ok(())
}
