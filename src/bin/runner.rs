//! Stream runner: the child end of a stream query exchange.
//!
//! Reads framed chunks on stdin, applies a registered function and writes
//! the results to stdout. Meant to be named as the command of a stream
//! query, e.g. `strumok-runner --read-spec --format feather`.

use std::io::{self, Write};

use strumok::protocol::FunctionSpec;
use strumok::stream::runner::{run, RunnerConfig};
use strumok::stream::Format;

fn print_usage() {
    eprintln!("usage: strumok-runner [--format feather|tsv] [--read-spec | --fn NAME [ARG]...]");
    eprintln!();
    eprintln!("  --format feather|tsv   exchange encoding (default feather)");
    eprintln!("  --read-spec            take the function from the payload broadcast");
    eprintln!("  --fn NAME [ARG]...     apply a registry function (head, identity, scale)");
}

fn parse_args() -> Result<RunnerConfig, String> {
    let mut format = Format::Feather;
    let mut func: Option<FunctionSpec> = None;
    let mut read_spec = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--format" => {
                let v = args.next().ok_or("--format needs a value")?;
                format = match v.as_str() {
                    "feather" => Format::Feather,
                    "tsv" => Format::Tsv,
                    other => return Err(format!("unknown format {other}")),
                };
            }
            "--read-spec" => read_spec = true,
            "--fn" => {
                let name = args.next().ok_or("--fn needs a function name")?;
                let rest: Vec<String> = args.by_ref().collect();
                let refs: Vec<&str> = rest.iter().map(|s| s.as_str()).collect();
                func = Some(FunctionSpec::new(&name, &refs));
            }
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument {other}")),
        }
    }

    if read_spec && func.is_some() {
        return Err("--read-spec and --fn are mutually exclusive".into());
    }

    Ok(RunnerConfig {
        format,
        func,
        read_spec,
    })
}

fn main() {
    let cfg = match parse_args() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("strumok-runner: {e}");
            print_usage();
            std::process::exit(2);
        }
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let result = run(&cfg, stdin.lock(), stdout.lock());

    if let Err(e) = result {
        eprintln!("strumok-runner: {e}");
        let _ = io::stderr().flush();
        std::process::exit(1);
    }
}
