//! applet-sim - run a sample applet against the simulated host
//!
//! Usage: applet-sim [-v] [--fs snapshot.json] [--save out.json] [--cwd dir] <applet> [args...]
//!
//! The applet's captured stdout and stderr are copied to ours and its exit
//! code becomes the process exit code.

use std::io::Write;
use std::process::ExitCode;

use applet_bridge::{SimHost, SimHostBuilder, applets};

const USAGE: &str = "usage: applet-sim [-v] [--fs snapshot.json] [--save out.json] [--cwd dir] <applet> [args...]";

/// Logs to stderr, enabled with -v
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        eprintln!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

#[derive(Debug, Default)]
struct Options {
    verbose: bool,
    snapshot: Option<String>,
    save: Option<String>,
    cwd: Option<String>,
    /// Applet name followed by its arguments
    argv: Vec<String>,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut opts = Options::default();

    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "-v" | "--verbose" => opts.verbose = true,
            "--fs" => opts.snapshot = Some(raw.next().ok_or("--fs needs a file")?),
            "--save" => opts.save = Some(raw.next().ok_or("--save needs a file")?),
            "--cwd" => opts.cwd = Some(raw.next().ok_or("--cwd needs a directory")?),
            "-h" | "--help" => return Err(USAGE.to_string()),
            _ => {
                opts.argv.push(arg);
                opts.argv.extend(raw.by_ref());
            }
        }
    }

    if opts.argv.is_empty() {
        return Err(USAGE.to_string());
    }
    Ok(opts)
}

fn build_host(opts: &Options) -> Result<SimHost, String> {
    let mut builder = SimHostBuilder::new();
    if let Some(path) = &opts.snapshot {
        let json = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path, e))?;
        builder = builder
            .snapshot_json(&json)
            .map_err(|e| format!("{}: {}", path, e))?;
    }
    if let Some(cwd) = &opts.cwd {
        builder = builder.cwd(cwd);
    }
    Ok(builder.build())
}

fn main() -> ExitCode {
    let opts = match parse_args(std::env::args().skip(1)) {
        Ok(opts) => opts,
        Err(msg) => {
            eprintln!("{}", msg);
            let names: Vec<_> = applets::names().collect();
            eprintln!("applets: {}", names.join(", "));
            return ExitCode::from(2);
        }
    };

    if opts.verbose && log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Trace);
    }

    let name = &opts.argv[0];
    let Some(applet) = applets::find(name) else {
        eprintln!("applet-sim: {}: no such applet", name);
        return ExitCode::from(127);
    };

    let mut host = match build_host(&opts) {
        Ok(host) => host,
        Err(msg) => {
            eprintln!("applet-sim: {}", msg);
            return ExitCode::from(2);
        }
    };

    let argv: Vec<&str> = opts.argv.iter().map(String::as_str).collect();
    let result = host.run(&argv, applet);

    let _ = std::io::stdout().write_all(&result.stdout);
    let _ = std::io::stderr().write_all(&result.stderr);

    if let Some(path) = &opts.save {
        let saved = host
            .to_json()
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
        if let Err(msg) = saved {
            eprintln!("applet-sim: {}: {}", path, msg);
            return ExitCode::from(2);
        }
    }

    log::debug!("applet-sim: {} exited with {}", name, result.exit_code);
    ExitCode::from(result.exit_code.clamp(0, 255) as u8)
}
