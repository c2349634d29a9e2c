//! Offline catalog inspection. Reads the sled catalog directly, so the
//! server must not be running against the same data directory.

use std::io;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};

use strumok::engine::ArrayMeta;

fn main() -> io::Result<()> {
    let data_dir = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| "data".to_string()),
    );
    let catalog_dir = data_dir.join("catalog");

    if !catalog_dir.exists() {
        eprintln!("Error: {} not found.", catalog_dir.display());
        eprintln!("Run the strumok server first to create the database.");
        std::process::exit(1);
    }

    let db = sled::open(&catalog_dir)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("sled open: {}", e)))?;
    let tree = db
        .open_tree("arrays")
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("open arrays: {}", e)))?;

    println!("{:<32} {:>12} {:>8}  {}", "NAME", "ROWS", "CHUNKS", "CREATED");

    let mut total_rows: u64 = 0;
    let mut count = 0usize;
    for item in tree.iter() {
        let (k, v) =
            item.map_err(|e| io::Error::new(io::ErrorKind::Other, format!("iter: {}", e)))?;
        let name = String::from_utf8_lossy(&k).into_owned();
        let meta: ArrayMeta = serde_json::from_slice(&v)?;

        let created = Utc
            .timestamp_opt(meta.created_ts as i64, 0)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();

        println!(
            "{:<32} {:>12} {:>8}  {}",
            name, meta.rows, meta.chunks, created
        );
        total_rows += meta.rows;
        count += 1;
    }

    println!();
    println!("{} arrays, {} rows total", count, total_rows);
    Ok(())
}
