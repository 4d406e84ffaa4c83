use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub run_seconds: Option<u64>,
    pub json_logs: bool,
    pub log_file: Option<PathBuf>,
    pub metrics_addr: Option<String>,
    pub audit_path: Option<PathBuf>,
    pub quiet: bool,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Self {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--run-seconds" => {
                    if i + 1 < args.len() {
                        cfg.run_seconds = args[i + 1].parse::<u64>().ok();
                        i += 1;
                    }
                }
                "--json-logs" => {
                    cfg.json_logs = true;
                }
                "--log-file" => {
                    if i + 1 < args.len() {
                        cfg.log_file = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    }
                }
                "--metrics-addr" => {
                    if i + 1 < args.len() {
                        cfg.metrics_addr = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--audit-log" => {
                    if i + 1 < args.len() {
                        cfg.audit_path = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    }
                }
                "--quiet" | "-q" => {
                    cfg.quiet = true;
                }
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                _ => {}
            }
            i += 1;
        }
        cfg
    }

    pub fn print_help() {
        println!(
            r#"shutter-sim - Motorized shutter bank simulator

USAGE:
    shutter-sim [OPTIONS]

Controls are read from stdin, one command per line:
    press <SLOT> <up|down>      Hold a control down
    release <SLOT> <up|down>    Let a control go
    tap <SLOT> <up|down>        Press and release
    quit                        Stop the simulation

Holding a control for more than one second moves every shutter.
Holding both controls of a slot stops that shutter.

OPTIONS:
    --run-seconds <SECS>    Run for a fixed duration then exit (stdin EOF does not stop)
    --json-logs             Output logs in JSON format
    --log-file <PATH>       Also write logs to a file
    --metrics-addr <ADDR>   Enable Prometheus metrics server on address (e.g., 127.0.0.1:9090)
    --audit-log <PATH>      Append control events to a JSONL file
    -q, --quiet             Do not draw progress bars
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log filter (e.g., RUST_LOG=debug,shutter_core=trace)

EXAMPLES:
    # Interactive run
    shutter-sim

    # Scripted run with an audit trail
    printf 'press 3 down\n' | shutter-sim --run-seconds 3 --audit-log audit.jsonl
"#
        );
    }
}
