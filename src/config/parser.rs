//! Configuration file parser.
//!
//! Parses TOML-style configuration files with a custom lightweight parser.

use super::types::*;
use std::{fs, io};

/// Load configuration from a file path.
pub fn load_config(path: &str) -> io::Result<Config> {
    let s = fs::read_to_string(path)?;
    parse_config(&s)
}

/// Parse configuration from a string.
fn parse_config(s: &str) -> io::Result<Config> {
    let mut cfg = Config::default();

    for (lineno, line) in s.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((lhs, rhs)) = line.split_once('=') else {
            continue;
        };
        let lhs = lhs.trim();
        let mut val = rhs.trim();
        if val.ends_with('#') {
            val = val.split('#').next().unwrap().trim();
        }

        let (section, key) = if let Some((a, b)) = lhs.split_once('.') {
            (a.trim(), b.trim())
        } else {
            ("", lhs)
        };

        if section.is_empty() {
            continue;
        }

        set_config_value(section, key, val, &mut cfg).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line {}: {}", lineno + 1, e),
            )
        })?;
    }

    Ok(cfg)
}

/// Set a configuration value based on section, key, and value strings.
fn set_config_value(section: &str, key: &str, val: &str, cfg: &mut Config) -> Result<(), String> {
    macro_rules! parse {
        (s) => {
            val.trim_matches('"').to_string()
        };
        (b) => {
            match val {
                "true" => true,
                "false" => false,
                _ => return Err(format!("bad bool {val}")),
            }
        };
        (u) => {
            val.parse::<u64>().map_err(|e| e.to_string())?
        };
        (usize_) => {
            val.parse::<usize>().map_err(|e| e.to_string())?
        };
    }

    match (section, key) {
        // Limits section
        ("limits", "hello_timeout_ms") => cfg.limits.hello_timeout_ms = parse!(u),
        ("limits", "command_timeout_ms") => cfg.limits.command_timeout_ms = parse!(u),
        ("limits", "stream_timeout_ms") => cfg.limits.stream_timeout_ms = parse!(u),
        ("limits", "max_active_conns") => cfg.limits.max_active_conns = parse!(usize_),
        ("limits", "max_hello_frame_bytes") => cfg.limits.max_hello_frame_bytes = parse!(usize_),
        ("limits", "max_cmd_frame_bytes") => cfg.limits.max_cmd_frame_bytes = parse!(usize_),
        ("limits", "max_name_bytes") => cfg.limits.max_name_bytes = parse!(usize_),
        ("limits", "max_upload_bytes") => cfg.limits.max_upload_bytes = parse!(usize_),
        ("limits", "max_expr_bytes") => cfg.limits.max_expr_bytes = parse!(usize_),
        ("limits", "max_command_bytes") => cfg.limits.max_command_bytes = parse!(usize_),
        ("limits", "max_options") => cfg.limits.max_options = parse!(usize_),
        ("limits", "max_option_bytes") => cfg.limits.max_option_bytes = parse!(usize_),
        ("limits", "per_connection_inflight_bytes") => {
            cfg.limits.per_connection_inflight_bytes = parse!(usize_)
        }
        ("limits", "global_inflight_bytes") => cfg.limits.global_inflight_bytes = parse!(usize_),

        // HTTP section
        ("http", "bind_addr") => {
            cfg.http.get_or_insert_with(Http::default).bind_addr = parse!(s);
        }

        // Engine section
        ("engine", "data_dir") => cfg.engine.data_dir = parse!(s),

        // Stream section
        ("stream", "child_shell") => cfg.stream.child_shell = parse!(s),
        ("stream", "chunk_rows") => cfg.stream.chunk_rows = parse!(usize_),
        ("stream", "max_build_cells") => cfg.stream.max_build_cells = parse!(u),
        ("stream", "max_child_message_bytes") => {
            cfg.stream.max_child_message_bytes = parse!(usize_)
        }
        ("stream", "max_child_lines") => cfg.stream.max_child_lines = parse!(usize_),

        // Server section
        ("server", "bind_addr") => cfg.server.bind_addr = parse!(s),
        ("server", "server_name") => cfg.server.server_name = parse!(s),
        ("server", "allow_remove") => cfg.server.allow_remove = parse!(b),

        _ => return Err(format!("unknown key {section}.{key}")),
    }

    Ok(())
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &str) -> io::Result<Self> {
        load_config(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_and_comments() {
        let cfg = parse_config(
            "# strumok config\n\
             server.bind_addr = \"0.0.0.0:6464\"\n\
             server.allow_remove = true\n\
             engine.data_dir = \"/var/lib/strumok\"\n\
             stream.chunk_rows = 5000\n\
             stream.max_build_cells = 4096\n\
             limits.max_upload_bytes = 1048576\n",
        )
        .unwrap();

        assert_eq!(cfg.server.bind_addr, "0.0.0.0:6464");
        assert!(cfg.server.allow_remove);
        assert_eq!(cfg.engine.data_dir, "/var/lib/strumok");
        assert_eq!(cfg.stream.chunk_rows, 5000);
        assert_eq!(cfg.stream.max_build_cells, 4096);
        assert_eq!(cfg.limits.max_upload_bytes, 1048576);
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(parse_config("server.no_such = 1\n").is_err());
    }

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.server.bind_addr, "127.0.0.1:6464");
        assert!(!cfg.server.allow_remove);
        assert_eq!(cfg.stream.child_shell, "sh");
    }
}
