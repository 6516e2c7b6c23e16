use guppiraw_pure::{Header, Reader};
use std::process;

fn format_block(index: usize, header: &Header, verbose: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("block {}: pktidx {}\n", index, header.pktidx));
    out.push_str(&format!("  Data size: {} bytes\n", header.blocsize));
    out.push_str(&format!(
        "  Geometry: {} antennas x {} channels x {} timesteps x {} pols\n",
        header.nants, header.num_channels, header.num_timesteps, header.npol
    ));
    if header.missing_blocks > 0 {
        out.push_str(&format!("  Missing blocks: {}\n", header.missing_blocks));
    }
    if verbose {
        out.push_str(&format!("  Source: {}\n", header.src_name));
        out.push_str(&format!("  Telescope: {}\n", header.telescop));
        out.push_str(&format!("  OBSFREQ: {} MHz\n", header.obsfreq));
        out.push_str(&format!("  OBSBW: {} MHz\n", header.obsbw));
        out.push_str(&format!("  TBIN: {} s\n", header.tbin));
        out.push_str(&format!("  RA: {} h, Dec: {} deg\n", header.ra, header.dec));
        out.push_str(&format!("  MJD: {}\n", header.mjd));
        out.push_str(&format!(
            "  Header size: {} bytes ({} padded)\n",
            header.hdr_size,
            header.padded_size()
        ));
        if let Ok(t) = header.start_time() {
            out.push_str(&format!("  Start time: {:.6}\n", t));
        }
    }
    out
}

fn run(args: &[String]) -> Result<String, String> {
    let mut verbose = false;
    let mut file_path = None;

    for arg in args {
        if arg == "-v" || arg == "--verbose" {
            verbose = true;
        } else if arg.starts_with('-') {
            return Err(format!("Unknown option: {}", arg));
        } else {
            if file_path.is_some() {
                return Err("Too many arguments".to_string());
            }
            file_path = Some(arg.as_str());
        }
    }

    let path = file_path.ok_or_else(|| {
        "Usage: rawinfo [-v] <file.raw>\n\nPrint a block summary for a raw recording.".to_string()
    })?;

    let mut reader =
        Reader::open(path).map_err(|e| format!("Error opening '{}': {}", path, e))?;

    let mut out = String::new();
    let mut index = 0;
    while let Some(header) = reader.read_header() {
        index += 1;
        if index > 1 {
            out.push('\n');
        }
        out.push_str(&format_block(index, &header, verbose));
    }

    if reader.error() {
        return Err(format!(
            "Error reading '{}': {}",
            path,
            reader.error_message()
        ));
    }
    if index == 0 {
        return Err(format!("'{}' holds no blocks", path));
    }
    Ok(out)
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(output) => print!("{}", output),
        Err(msg) => {
            eprintln!("{}", msg);
            process::exit(1);
        }
    }
}
