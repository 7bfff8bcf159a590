use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::{env, process};

use proctorcast::client::{
    ClientListener, ClientSettings, FrameSource, StillImageSource, StreamingClient,
};
use proctorcast::config::Config;
use proctorcast::log::logger::DEFAULT_QUEUE_CAP;
use proctorcast::log::{LogSink, Logger};
use proctorcast::sink_warn;

const DEFAULT_CONFIG: &str = "proctor_client.conf";

/// Tells the person at the keyboard what the proctor did.
struct ConsoleListener;

impl ClientListener for ConsoleListener {
    fn on_test_over(&self) {
        eprintln!("\n*** The test is over. Type `quit` to leave. ***");
    }

    fn on_file_available(&self) {
        eprintln!("\n*** The proctor shared a file. Type `download` to fetch it. ***");
    }
}

fn ask_username() -> io::Result<String> {
    let stdin = io::stdin();
    loop {
        eprint!("username: ");
        io::stderr().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no username given"));
        }
        let name = line.trim();
        if !name.is_empty() {
            return Ok(name.to_owned());
        }
    }
}

#[cfg(feature = "camera")]
fn open_source(
    settings: &ClientSettings,
    log: &Arc<dyn LogSink>,
) -> Result<Box<dyn FrameSource>, Box<dyn Error>> {
    if let Some(path) = &settings.frame_image {
        return Ok(Box::new(StillImageSource::open(path, settings.fps)?));
    }
    let cam = proctorcast::client::CameraSource::open(
        settings.camera_index,
        settings.fps,
        settings.jpeg_quality,
        log.clone(),
    )?;
    Ok(Box::new(cam))
}

#[cfg(not(feature = "camera"))]
fn open_source(
    settings: &ClientSettings,
    _log: &Arc<dyn LogSink>,
) -> Result<Box<dyn FrameSource>, Box<dyn Error>> {
    let path = settings
        .frame_image
        .as_ref()
        .ok_or("no camera support compiled in; set [Client] frame_image")?;
    Ok(Box::new(StillImageSource::open(path, settings.fps)?))
}

fn run_console(client: &StreamingClient, settings: &ClientSettings, log: &Arc<dyn LogSink>) {
    eprintln!("commands: upload <path> | download | quit");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

        match (word, rest.trim()) {
            ("", _) => {}
            ("upload", path) if !path.is_empty() => match client.request_upload(Path::new(path)) {
                Ok(bytes) => eprintln!("uploaded {path} ({bytes} bytes)"),
                Err(e) => {
                    sink_warn!(log, "upload of {} failed: {}", path, e);
                    eprintln!("upload failed: {e}");
                }
            },
            ("download", "") => match client.request_download(&settings.download_dir) {
                Ok(Some(saved)) => eprintln!("saved {}", saved.display()),
                Ok(None) => eprintln!("no file available yet"),
                Err(e) => eprintln!("download failed: {e}"),
            },
            ("quit" | "exit", _) => break,
            _ => eprintln!("unknown command {line:?}"),
        }

        if !client.is_running() {
            eprintln!("connection to the proctor was lost");
            break;
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();

    let config = match args.len() {
        1 => Config::load_first(&[DEFAULT_CONFIG]).0,
        2 => Config::load(&args[1])?,
        _ => {
            eprintln!("Usage:");
            eprintln!("  {}            # uses ./{DEFAULT_CONFIG} or defaults", args[0]);
            eprintln!("  {} [CONFIG]   # e.g. student.conf", args[0]);
            process::exit(1);
        }
    };

    let logger = Logger::start_client(DEFAULT_QUEUE_CAP, &config);
    let log: Arc<dyn LogSink> = Arc::new(logger.handle());

    let mut settings = ClientSettings::from_config(&config);
    if settings.username.is_empty() {
        settings.username = ask_username()?;
    }

    let source = open_source(&settings, &log)?;
    let client = StreamingClient::connect(
        settings.server_addr.as_str(),
        Arc::new(ConsoleListener),
        log.clone(),
    )?;
    client.start_session(&settings.username, source)?;
    eprintln!(
        "[proctor_client] streaming to {} as {:?} (log: {})",
        client.server_addr(),
        settings.username,
        logger.file_path().display()
    );

    run_console(&client, &settings, &log);
    client.stop_session()?;
    Ok(())
}
