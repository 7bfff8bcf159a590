use std::io::{self, BufRead};
use std::path::Path;
use std::sync::Arc;
use std::{env, process};

use proctorcast::config::Config;
use proctorcast::log::logger::DEFAULT_QUEUE_CAP;
use proctorcast::log::{LogSink, Logger};
use proctorcast::server::{FrameDumpListener, ServerHandle, ServerSettings, StreamingServer};
use proctorcast::{sink_info, sink_warn};

const DEFAULT_CONFIG: &str = "proctor_server.conf";

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Over,
    Publish(&'a str),
    Collect(&'a str),
    Peers,
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse_command(line: &str) -> Option<Command<'_>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    Some(match (word, rest) {
        ("over", "") => Command::Over,
        ("publish", path) if !path.is_empty() => Command::Publish(path),
        ("collect", label) if !label.is_empty() => Command::Collect(label),
        ("peers", "") => Command::Peers,
        ("help", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        _ => Command::Unknown(line),
    })
}

fn print_help() {
    eprintln!("commands:");
    eprintln!("  over              end the exam on every connected peer");
    eprintln!("  publish <path>    hand out a file to every peer");
    eprintln!("  collect <label>   move uploads into the collect folder under <label>");
    eprintln!("  peers             list live connections and streaming users");
    eprintln!("  quit              notify peers and stop the server");
}

fn run_console(handle: &ServerHandle, dump: &FrameDumpListener, log: &Arc<dyn LogSink>) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let Some(cmd) = parse_command(&line) else {
            continue;
        };
        match cmd {
            Command::Over => {
                let report = handle.broadcast_test_over();
                eprintln!(
                    "TEST_OVER sent to {} connections ({} failed)",
                    report.delivered.len(),
                    report.failed.len()
                );
            }
            Command::Publish(path) => match handle.publish_file(Path::new(path)) {
                Ok(report) => eprintln!(
                    "published {path}; {} connections notified",
                    report.delivered.len()
                ),
                Err(e) => {
                    sink_warn!(log, "publish {} failed: {}", path, e);
                    eprintln!("cannot publish {path}: {e}");
                }
            },
            Command::Collect(label) => match handle.collect_submissions(label) {
                Ok(moved) => {
                    eprintln!("collected {} files", moved.len());
                    for path in moved {
                        eprintln!("  {}", path.display());
                    }
                }
                Err(e) => eprintln!("collect failed: {e}"),
            },
            Command::Peers => {
                let peers = handle.peers();
                eprintln!("{} live connections", peers.len());
                for peer in peers {
                    eprintln!("  {peer}");
                }
                eprintln!("streaming: {}", dump.active_users().join(", "));
            }
            Command::Help => print_help(),
            Command::Quit => break,
            Command::Unknown(text) => eprintln!("unknown command {text:?}; try `help`"),
        }
    }
}

fn main() -> io::Result<()> {
    // --- Parse CLI args ----------------------------------------------------
    //
    //   proctor_server                 -> ./proctor_server.conf if present
    //   proctor_server path/to/conf    -> that file (must exist)
    let args: Vec<String> = env::args().collect();

    let config = match args.len() {
        1 => Config::load_first(&[DEFAULT_CONFIG]).0,
        2 => match Config::load(&args[1]) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        },
        _ => {
            eprintln!("Usage:");
            eprintln!("  {}            # uses ./{DEFAULT_CONFIG} or defaults", args[0]);
            eprintln!("  {} [CONFIG]   # e.g. exam.conf", args[0]);
            process::exit(1);
        }
    };

    // --- Start process logger ----------------------------------------------
    let logger = Logger::start_server(DEFAULT_QUEUE_CAP, &config);
    let log: Arc<dyn LogSink> = Arc::new(logger.handle());

    let settings = ServerSettings::from_config(&config);
    let dump = Arc::new(FrameDumpListener::new(&settings.frames_dir, log.clone())?);

    let server = StreamingServer::bind(settings, dump.clone(), log.clone())?;
    eprintln!(
        "[proctor_server] listening on {} (log: {})",
        server.local_addr(),
        logger.file_path().display()
    );
    eprintln!("[proctor_server] frames in {}", dump.dir().display());
    print_help();

    let (handle, accept) = server.spawn()?;
    run_console(&handle, &dump, &log);

    handle.shutdown();
    match accept.join() {
        Ok(result) => result?,
        Err(_) => sink_warn!(log, "accept loop panicked"),
    }
    sink_info!(log, "server stopped");
    Ok(())
}
