//! Stream query option parsing.
//!
//! Options arrive as `key=value` strings on the query request:
//! `format=` selects the child exchange encoding, `types=` declares the
//! child's output schema and `names=` the output attribute names.

use crate::common::error::StreamError;

/// Child exchange encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Feather,
    Tsv,
}

/// Declared child output column type (feather mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    Double,
    Int64,
    String,
}

impl OutputType {
    fn parse(s: &str) -> Result<Self, StreamError> {
        match s {
            "double" => Ok(Self::Double),
            "int64" => Ok(Self::Int64),
            "string" => Ok(Self::String),
            other => Err(StreamError::BadArgs(format!("unknown output type {other}"))),
        }
    }
}

/// Parsed stream options.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub format: Format,
    /// Declared output column types; empty means accept whatever the child
    /// sends.
    pub types: Vec<OutputType>,
    /// Output attribute names, defaulted to `a0..aN` when not given.
    pub names: Vec<String>,
}

impl StreamSettings {
    pub fn parse(options: &[String]) -> Result<Self, StreamError> {
        let mut format = None;
        let mut types: Vec<OutputType> = Vec::new();
        let mut names: Vec<String> = Vec::new();

        for opt in options {
            let Some((key, val)) = opt.split_once('=') else {
                return Err(StreamError::BadArgs(format!("malformed option {opt}")));
            };
            match key.trim() {
                "format" => {
                    format = Some(match val.trim() {
                        "feather" => Format::Feather,
                        "tsv" => Format::Tsv,
                        other => {
                            return Err(StreamError::BadArgs(format!("unknown format {other}")))
                        }
                    })
                }
                "types" => {
                    types = val
                        .split(',')
                        .map(|t| OutputType::parse(t.trim()))
                        .collect::<Result<_, _>>()?;
                }
                "names" => {
                    names = val.split(',').map(|n| n.trim().to_string()).collect();
                }
                other => return Err(StreamError::BadArgs(format!("unknown option {other}"))),
            }
        }

        let format = format.ok_or_else(|| StreamError::BadArgs("format= is required".into()))?;

        if format == Format::Tsv && !types.is_empty() {
            return Err(StreamError::BadArgs(
                "types= applies to feather format only".into(),
            ));
        }
        if !names.is_empty() && !types.is_empty() && names.len() != types.len() {
            return Err(StreamError::BadArgs(
                "names= and types= lengths differ".into(),
            ));
        }
        if names.is_empty() {
            let n = types.len();
            names = (0..n).map(|i| format!("a{i}")).collect();
        }

        Ok(Self {
            format,
            types,
            names,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn feather_with_types() {
        let s = StreamSettings::parse(&opts(&["format=feather", "types=double"])).unwrap();
        assert_eq!(s.format, Format::Feather);
        assert_eq!(s.types, vec![OutputType::Double]);
        assert_eq!(s.names, vec!["a0"]);
    }

    #[test]
    fn explicit_names() {
        let s = StreamSettings::parse(&opts(&[
            "format=feather",
            "types=double,int64",
            "names=val,count",
        ]))
        .unwrap();
        assert_eq!(s.names, vec!["val", "count"]);
    }

    #[test]
    fn tsv_rejects_types() {
        assert!(StreamSettings::parse(&opts(&["format=tsv", "types=double"])).is_err());
    }

    #[test]
    fn format_required() {
        assert!(StreamSettings::parse(&opts(&["types=double"])).is_err());
    }

    #[test]
    fn name_type_length_mismatch() {
        assert!(StreamSettings::parse(&opts(&[
            "format=feather",
            "types=double",
            "names=a,b"
        ]))
        .is_err());
    }
}
