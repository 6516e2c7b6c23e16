use guppiraw_pure::Reader;
use std::process;

fn run(args: &[String]) -> Result<String, String> {
    let mut file_path = None;

    for arg in args {
        if arg.starts_with('-') {
            return Err(format!("Unknown option: {}", arg));
        }
        if file_path.is_some() {
            return Err("Too many arguments".to_string());
        }
        file_path = Some(arg.as_str());
    }

    let path = file_path.ok_or_else(|| {
        "Usage: rawcheck <file.raw>\n\nRead every block of a raw recording and report its integrity."
            .to_string()
    })?;

    let mut reader =
        Reader::open(path).map_err(|e| format!("Error opening '{}': {}", path, e))?;

    let mut buf = Vec::new();
    let mut blocks = 0u64;
    let mut data_bytes = 0u64;
    let mut missing = 0i64;
    while let Some(header) = reader.read_header() {
        buf.resize(header.blocsize as usize, 0);
        if !reader.read_data(&mut buf) {
            break;
        }
        blocks += 1;
        data_bytes += header.blocsize;
        missing += header.missing_blocks.max(0);
    }

    if reader.error() {
        return Err(format!(
            "Error reading '{}': {}",
            path,
            reader.error_message()
        ));
    }
    if blocks == 0 {
        return Err(format!("'{}' holds no blocks", path));
    }

    let mut out = String::new();
    out.push_str(&format!("{} blocks, {} data bytes\n", blocks, data_bytes));
    out.push_str(&format!("missing blocks: {}\n", missing));
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

#[cfg(test)]
mod tests {
    use super::*;
    use guppiraw_pure::RECORD_SIZE;

    fn record(text: &str) -> [u8; RECORD_SIZE] {
        let mut r = [b' '; RECORD_SIZE];
        let bytes = text.as_bytes();
        r[..bytes.len()].copy_from_slice(bytes);
        r
    }

    fn block(pktidx: i64, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for line in [
            "BLOCSIZE= 640".to_string(),
            "NPOL    = 2".to_string(),
            "OBSNCHAN= 8".to_string(),
            "NBITS   = 8".to_string(),
            format!("PKTIDX  = {}", pktidx),
            "OBSFREQ = 1500.0".to_string(),
            "OBSBW   = 187.5".to_string(),
            "TBIN    = 1.0E-6".to_string(),
            "NANTS   = 2".to_string(),
        ] {
            out.extend_from_slice(&record(&line));
        }
        out.extend_from_slice(&record("END"));
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn run_summarizes_healthy_file() {
        let dir = std::env::temp_dir().join("rawcheck_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.raw");
        let mut bytes = block(0, &[1u8; 640]);
        bytes.extend_from_slice(&block(6, &[2u8; 640]));
        std::fs::write(&path, bytes).unwrap();

        let args = vec![path.to_str().unwrap().to_string()];
        let result = run(&args).unwrap();
        assert!(result.contains("2 blocks, 1280 data bytes"));
        assert!(result.contains("missing blocks: 5"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn run_reports_truncated_block() {
        let dir = std::env::temp_dir().join("rawcheck_test_truncated");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.raw");
        let mut bytes = block(0, &[1u8; 640]);
        bytes.extend_from_slice(&block(1, &[2u8; 100]));
        std::fs::write(&path, bytes).unwrap();

        let args = vec![path.to_str().unwrap().to_string()];
        let result = run(&args);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("incomplete block"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn run_missing_file() {
        let args = vec!["nonexistent.raw".to_string()];
        let result = run(&args);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Error opening"));
    }

    #[test]
    fn run_no_args() {
        let args: Vec<String> = vec![];
        let result = run(&args);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Usage:"));
    }
}
