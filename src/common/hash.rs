//! Small hash helpers and debugging formatters.

/// Fast 64-bit hash function (wyhash variant).
#[inline]
pub fn wyhash64(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51afd7ed558ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ceb9fe1a85ec53);
    x ^ (x >> 33)
}

/// Format bytes as a hex dump for debugging.
pub fn hex_dump(data: &[u8], max_bytes: usize) -> String {
    let limit = data.len().min(max_bytes);
    let mut result = String::new();

    for (i, chunk) in data[..limit].chunks(16).enumerate() {
        result.push_str(&format!("{:04x}: ", i * 16));

        for (j, byte) in chunk.iter().enumerate() {
            if j == 8 {
                result.push(' ');
            }
            result.push_str(&format!("{:02x} ", byte));
        }

        for j in chunk.len()..16 {
            if j == 8 {
                result.push(' ');
            }
            result.push_str("   ");
        }

        result.push_str(" |");

        for byte in chunk {
            if byte.is_ascii_graphic() || *byte == b' ' {
                result.push(*byte as char);
            } else {
                result.push('.');
            }
        }

        result.push_str("|\n");
    }

    if data.len() > max_bytes {
        result.push_str(&format!("... ({} more bytes)\n", data.len() - max_bytes));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wyhash_mixes() {
        assert_ne!(wyhash64(0), wyhash64(1));
        assert_eq!(wyhash64(42), wyhash64(42));
    }

    #[test]
    fn hex_dump_truncates() {
        let data = vec![0u8; 64];
        let s = hex_dump(&data, 16);
        assert!(s.contains("more bytes"));
    }
}
