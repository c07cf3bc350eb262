//! Interactive console: probe a live controller, stream telemetry, and send
//! commands typed on stdin.
//!
//! Usage: cargo run --example console -- [ADDRESS]
//!
//! Requires: connected to the controller's WiFi (default address 192.168.4.1).
//! Set `RUST_LOG=debug` to see every request's hex dump.

use std::io::{self, BufRead};
use std::process;

use puttpilot::addr::DEFAULT_ADDR;
use puttpilot::poll::{Stream, TelemetrySnapshot};
use puttpilot::shape::{CourseShape, SlopeEffect};
use puttpilot::{
    ActuatorGrid, BallDispensingMode, ClientConfig, ConnError, CourseMode, HttpTransport, Preset, Session,
};

// ---------------------------------------------------------------------------
// Pretty-printers
// ---------------------------------------------------------------------------

fn print_update(stream: Stream, snap: &TelemetrySnapshot) {
    match stream {
        Stream::Stats => match (&snap.stats.value, &snap.stats.last_error) {
            (_, Some(e)) => println!("[stats] error: {e}"),
            (Some(stats), None) => println!("[stats] {stats}"),
            (None, None) => {}
        },
        Stream::ErrorCodes => match (&snap.error_codes.value, &snap.error_codes.last_error) {
            (_, Some(e)) => println!("[faults] error: {e}"),
            (Some(codes), None) if !codes.codes().is_empty() => {
                println!("[faults] {codes}");
                for fault in codes.faults() {
                    println!("  {fault}");
                }
            }
            _ => {}
        },
        Stream::DebugMessage => {
            if let Some(msg) = &snap.debug_message.value {
                if !msg.is_empty() {
                    println!("[debug] {msg}");
                }
            }
        }
    }
}

fn print_grid(grid: &ActuatorGrid) {
    for row in grid.iter_rows() {
        let cells: Vec<String> = row.iter().map(|a| format!("{a:>3.0}")).collect();
        println!("  {}", cells.join(" "));
    }
}

fn print_help() {
    println!("commands:");
    println!("  preset flat|left|right|uphill   send a preset shape");
    println!("  shape L R U                     left/right/uphill steepness (0-100)");
    println!("  mode static|wave|tsunami        resend the last grid in a mode");
    println!("  return                          run ball return");
    println!("  dispense N                      dispense N balls (0-10)");
    println!("  auto | manual                   ball dispensing mode");
    println!("  reset                           zero the ball counters");
    println!("  addr HOST                       switch controller address");
    println!("  quit");
}

// ---------------------------------------------------------------------------
// Command parsing
// ---------------------------------------------------------------------------

fn parse_preset(name: &str) -> Option<Preset> {
    match name {
        "flat" => Some(Preset::Flat),
        "left" => Some(Preset::LeftLeaning),
        "right" => Some(Preset::RightLeaning),
        "uphill" => Some(Preset::Uphill),
        _ => None,
    }
}

fn parse_mode(name: &str) -> Option<CourseMode> {
    match name {
        "static" => Some(CourseMode::Static),
        "wave" => Some(CourseMode::Wave),
        "tsunami" => Some(CourseMode::Tsunami),
        _ => None,
    }
}

/// Run one console line. Returns false on `quit`.
fn dispatch(session: &Session<HttpTransport>, grid: &mut ActuatorGrid, line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    let result = match words.as_slice() {
        [] => Ok(()),
        ["quit"] | ["exit"] => return false,
        ["help"] => {
            print_help();
            Ok(())
        }
        ["preset", name] => match parse_preset(name) {
            Some(preset) => {
                *grid = preset.grid();
                print_grid(grid);
                session.send_course_state(CourseMode::Static, grid)
            }
            None => {
                println!("unknown preset {name}");
                Ok(())
            }
        },
        ["shape", l, r, u] => {
            let pct = |s: &str| s.parse::<f64>().unwrap_or(0.0);
            let shape = CourseShape {
                left_lean: SlopeEffect::new(pct(l), 0.0),
                right_lean: SlopeEffect::new(pct(r), 0.0),
                uphill: SlopeEffect::new(pct(u), 0.0),
            };
            session.send_shape(&shape).map(|sent| {
                print_grid(&sent);
                *grid = sent;
            })
        }
        ["mode", name] => match parse_mode(name) {
            Some(mode) => session.send_course_state(mode, grid),
            None => {
                println!("unknown mode {name}");
                Ok(())
            }
        },
        ["return"] => session.return_balls(grid),
        ["dispense", n] => match n.parse::<u32>() {
            Ok(count) => session.dispense_balls(count),
            Err(_) => {
                println!("not a number: {n}");
                Ok(())
            }
        },
        ["auto"] => session.send_settings(BallDispensingMode::Automatic),
        ["manual"] => session.send_settings(BallDispensingMode::Manual),
        ["reset"] => session.reset_stats(),
        ["addr", host] => session.set_address(host),
        _ => {
            print_help();
            Ok(())
        }
    };
    if let Err(e) = result {
        println!("  ... {e}");
    }
    true
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    tracing_subscriber::fmt::init();
    if let Err(e) = run() {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), ConnError> {
    let address = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let config = ClientConfig { address, ..ClientConfig::default() };

    // 1. Probe
    let session = Session::connect_http(config)?;
    println!("Probing {}...", session.address());
    session.probe()?.wait();
    println!("Connected. Default state pushed.");

    // 2. Telemetry
    let mut poller = session.poller();
    poller.on_update(print_update);
    poller.start()?;

    // 3. Commands
    print_help();
    let mut grid = ActuatorGrid::flat();
    for line in io::stdin().lock().lines() {
        if !dispatch(&session, &mut grid, line?.trim()) {
            break;
        }
    }

    poller.stop();
    Ok(())
}
