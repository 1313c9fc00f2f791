//! The operator terminal: an interactive loop that filters and prints
//! stored telemetry, run alongside (not instead of) the TCP accept loop.

use std::io::{self, Write};

use crate::store::TelemetryStore;

/// Prompt for an optional device-id filter and session-id filter, print
/// matching entries, and repeat until the operator types `exit`.
///
/// Blocking stdin reads are run on a dedicated blocking thread by the
/// caller (see `main.rs`) so they never stall the async accept loop.
pub fn run(store: &TelemetryStore) {
    loop {
        print!("vaultkeep> device id (blank = any, 'exit' to quit): ");
        io::stdout().flush().ok();
        let device_input = read_line();
        if device_input.eq_ignore_ascii_case("exit") {
            break;
        }

        print!("vaultkeep> session id (blank = any): ");
        io::stdout().flush().ok();
        let session_input = read_line();

        let device_id = parse_filter(&device_input);
        let session_id = parse_filter(&session_input);

        match store.iterate_filtered(device_id, session_id) {
            Ok(entries) if entries.is_empty() => println!("(no matching entries)"),
            Ok(entries) => {
                for entry in entries {
                    let readings =
                        entry.readings.iter().map(|r| format!("{r:.2}")).collect::<Vec<_>>().join(" ");
                    println!(
                        "dev_id: {} | session: {} | state: {} | time: {} | {}",
                        entry.device_id, entry.session_id, entry.state, entry.timestamp, readings
                    );
                }
            }
            Err(err) => eprintln!("failed to query telemetry store: {err}"),
        }
    }
}

fn read_line() -> String {
    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_err() {
        return String::new();
    }
    line.trim().to_string()
}

fn parse_filter(input: &str) -> Option<u32> {
    if input.is_empty() {
        None
    } else {
        input.parse().ok()
    }
}
