use std::io::Write;
use std::path::Path;
use std::time::Instant;

use guppiraw_pure::{Reader, RECORD_SIZE};

// ---------------------------------------------------------------------------
// Synthetic recordings
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
struct Geometry {
    label: &'static str,
    nants: u32,
    obsnchan: u32,
    num_timesteps: u64,
    blocks: usize,
    iterations: usize,
}

impl Geometry {
    fn blocsize(&self) -> u64 {
        // 2 pols, 8-bit complex samples: 4 bytes per timestep per channel.
        4 * u64::from(self.obsnchan) * self.num_timesteps
    }

    fn total_bytes(&self) -> u64 {
        self.blocsize() * self.blocks as u64
    }
}

fn record(text: &str) -> [u8; RECORD_SIZE] {
    let mut r = [b' '; RECORD_SIZE];
    let bytes = text.as_bytes();
    r[..bytes.len()].copy_from_slice(bytes);
    r
}

fn generate_block(n: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(n);
    let mut state: u64 = 0xdeadbeef;
    for _ in 0..n {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        data.push((state >> 32) as u8);
    }
    data
}

fn synthesize(path: &Path, geo: Geometry) {
    let blocsize = geo.blocsize();
    let block = generate_block(blocsize as usize);
    let mut out = std::io::BufWriter::new(std::fs::File::create(path).unwrap());

    for index in 0..geo.blocks {
        for line in [
            format!("BLOCSIZE= {blocsize}"),
            String::from("NPOL    = 2"),
            format!("OBSNCHAN= {}", geo.obsnchan),
            String::from("NBITS   = 8"),
            format!("PKTIDX  = {index}"),
            String::from("OBSFREQ = 1500.0"),
            String::from("OBSBW   = 187.5"),
            String::from("TBIN    = 1.0E-6"),
            format!("NANTS   = {}", geo.nants),
            String::from("END"),
        ] {
            out.write_all(&record(&line)).unwrap();
        }
        out.write_all(&block).unwrap();
    }
    out.flush().unwrap();
}

// ---------------------------------------------------------------------------
// Access strategies
// ---------------------------------------------------------------------------

fn read_sequential(path: &Path) -> u64 {
    let mut reader = Reader::open(path).unwrap();
    let mut buf = Vec::new();
    let mut total = 0u64;
    while let Some(header) = reader.read_header() {
        buf.resize(header.blocsize as usize, 0);
        assert!(reader.read_data(&mut buf));
        total += header.blocsize;
    }
    assert!(!reader.error(), "{}", reader.error_message());
    total
}

fn read_banded(path: &Path, num_bands: usize) -> u64 {
    let mut reader = Reader::open(path).unwrap();
    let mut buf = Vec::new();
    let mut total = 0u64;
    while let Some(header) = reader.read_header() {
        let band_bytes = header.blocsize as usize / num_bands;
        buf.resize(band_bytes, 0);
        for band in 0..num_bands {
            reader.read_band(&header, band, num_bands, &mut buf).unwrap();
            total += band_bytes as u64;
        }
    }
    assert!(!reader.error(), "{}", reader.error_message());
    total
}

fn read_banded_async(path: &Path, num_bands: usize) -> u64 {
    let mut reader = Reader::open(path).unwrap();
    let mut buf = Vec::new();
    let mut total = 0u64;
    while let Some(header) = reader.read_header() {
        let band_bytes = header.blocsize as usize / num_bands;
        buf.resize(band_bytes, 0);
        for band in 0..num_bands {
            for task in reader.read_band_async(&header, band, num_bands) {
                task.wait_into(&mut buf).unwrap();
            }
            total += band_bytes as u64;
        }
    }
    assert!(!reader.error(), "{}", reader.error_message());
    total
}

// ---------------------------------------------------------------------------
// Benchmark harness
// ---------------------------------------------------------------------------

struct BenchResult {
    label: String,
    elapsed_ms: f64,
    mb_per_sec: f64,
}

fn time_iterations<F: FnMut()>(mut f: F, iterations: usize) -> f64 {
    let start = Instant::now();
    for _ in 0..iterations {
        f();
    }
    start.elapsed().as_secs_f64() * 1000.0 / iterations as f64
}

fn bench_strategy(
    label: &str,
    iterations: usize,
    total_bytes: u64,
    run: impl Fn(),
) -> BenchResult {
    let megabytes = total_bytes as f64 / 1_000_000.0;

    // Warmup
    run();

    let elapsed_ms = time_iterations(|| run(), iterations);

    BenchResult {
        label: label.to_string(),
        elapsed_ms,
        mb_per_sec: megabytes / (elapsed_ms / 1000.0),
    }
}

fn run_benchmarks(dir: &Path) -> Vec<BenchResult> {
    let mut results = Vec::new();

    let geometries = [
        Geometry {
            label: "1 ant x 64 ch",
            nants: 1,
            obsnchan: 64,
            num_timesteps: 8192,
            blocks: 8,
            iterations: 20,
        },
        Geometry {
            label: "4 ant x 256 ch",
            nants: 4,
            obsnchan: 256,
            num_timesteps: 2048,
            blocks: 8,
            iterations: 10,
        },
        Geometry {
            label: "8 ant x 512 ch",
            nants: 8,
            obsnchan: 512,
            num_timesteps: 1024,
            blocks: 8,
            iterations: 5,
        },
    ];

    for geo in geometries {
        eprint!("  {} ...", geo.label);

        let path = dir.join("bench.raw");
        synthesize(&path, geo);
        let total = geo.total_bytes();

        results.push(bench_strategy(
            &format!("{} sequential", geo.label),
            geo.iterations,
            total,
            || assert_eq!(read_sequential(&path), total),
        ));
        results.push(bench_strategy(
            &format!("{} 4 bands", geo.label),
            geo.iterations,
            total,
            || assert_eq!(read_banded(&path, 4), total),
        ));
        results.push(bench_strategy(
            &format!("{} 4 bands threaded", geo.label),
            geo.iterations,
            total,
            || assert_eq!(read_banded_async(&path, 4), total),
        ));

        let _ = std::fs::remove_file(&path);
        eprintln!(" done");
    }

    results
}

fn print_results(results: &[BenchResult]) {
    println!(
        "| {:30} | {:>10} | {:>10} |",
        "Test", "Time ms", "MB/s"
    );
    println!("|{:-<32}|{:->12}|{:->12}|", "", "", "");
    for r in results {
        println!(
            "| {:30} | {:>10.2} | {:>10.1} |",
            r.label, r.elapsed_ms, r.mb_per_sec
        );
    }
}

fn main() {
    let dir = std::env::temp_dir().join("raw-benchmark");
    std::fs::create_dir_all(&dir).unwrap();

    println!("# Raw block read benchmark\n");
    println!("Measuring read throughput over synthetic voltage recordings.");
    println!("Each strategy walks every block of the file; reported times are");
    println!("averages over repeated passes. MB/s = megabytes per second.\n");

    let results = run_benchmarks(&dir);
    print_results(&results);

    let _ = std::fs::remove_dir_all(&dir);
}
