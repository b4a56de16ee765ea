use ebcot_rs::jpeg2000::bit_plane_coder::{decode_code_block, encode_code_block};
use ebcot_rs::jpeg2000::kernel::{ChunkedKernel, SampleKernel, ScalarKernel};
use ebcot_rs::{CodeBlock, CodeBlockGeometry, CodeBlockStyle, SubbandOrientation};
use std::time::Instant;

fn main() {
    println!("Benchmarking Tier-1 coding...");

    let mut seed = 1u32;
    let samples: Vec<i32> = (0..64 * 64)
        .map(|_| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            ((seed >> 8) % 4001) as i32 - 2000
        })
        .collect(); // Synthetic detail-band coefficients

    let iterations = 2_000;

    // Sample scaling: scalar reference against the chunked kernel
    let mut scaled_scalar = vec![0i32; samples.len()];
    let start = Instant::now();
    for _ in 0..iterations {
        let max = ScalarKernel.scale_integer(&samples, &mut scaled_scalar);
        std::hint::black_box(max.ok());
    }
    let duration_scalar = start.elapsed();
    println!("Scalar kernel: {:?} for {} iterations", duration_scalar, iterations);

    let mut scaled_chunked = vec![0i32; samples.len()];
    let start = Instant::now();
    for _ in 0..iterations {
        let max = ChunkedKernel.scale_integer(&samples, &mut scaled_chunked);
        std::hint::black_box(max.ok());
    }
    let duration_chunked = start.elapsed();
    println!("Chunked kernel: {:?} for {} iterations", duration_chunked, iterations);

    let speedup = duration_scalar.as_secs_f64() / duration_chunked.as_secs_f64();
    println!("Speedup: {:.2}x", speedup);
    if scaled_scalar == scaled_chunked {
        println!("Kernels agree: PASSED");
    } else {
        println!("Kernels agree: FAILED");
    }

    // Block coder throughput
    let block = match CodeBlock::reversible(
        CodeBlockGeometry::with_size(64, 64),
        SubbandOrientation::HL,
        samples.clone(),
        12,
    ) {
        Ok(block) => block,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let block_iterations = 200;
    for bits in [0u8, CodeBlockStyle::BYPASS, CodeBlockStyle::TERMINATE_ALL] {
        let Ok(style) = CodeBlockStyle::from_bits(bits) else {
            continue;
        };
        let start = Instant::now();
        let mut encoded = None;
        for _ in 0..block_iterations {
            encoded = encode_code_block(&block, style).ok();
            std::hint::black_box(&encoded);
        }
        let encode_time = start.elapsed();
        let Some(encoded) = encoded else {
            println!("style {:#04x}: encode FAILED", bits);
            continue;
        };

        let start = Instant::now();
        let mut exact = true;
        for _ in 0..block_iterations {
            let decoded = decode_code_block(&encoded, style, encoded.passes.len());
            exact &= decoded.is_ok_and(|d| d.coefficients == samples);
        }
        let decode_time = start.elapsed();

        let msamples = (64 * 64 * block_iterations) as f64 / 1e6;
        println!(
            "style {:#04x}: {} bytes, encode {:.1} Msamples/s, decode {:.1} Msamples/s, {}",
            bits,
            encoded.data.len(),
            msamples / encode_time.as_secs_f64(),
            msamples / decode_time.as_secs_f64(),
            if exact { "lossless" } else { "MISMATCH" }
        );
    }
}
