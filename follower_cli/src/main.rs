//! # Line follower operator console
//!
//! Reads commands at a prompt, sends them to the executive as telecommands and prints the
//! response. Type `help` for the list of commands, Ctrl-C or Ctrl-D to quit.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use color_eyre::{eyre::WrapErr, Report};
use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    tc::{Tc, TcResponse},
};
use rustyline::{error::ReadlineError, DefaultEditor};
use serde::Deserialize;
use structopt::StructOpt;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const PROMPT: &str = "follower $ ";
const HISTORY_PATH: &str = "data/history.txt";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CliParams {
    /// Endpoint of the executive's telecommand server
    tc_endpoint: String,

    /// How long to wait for the executive to respond
    timeout_ms: i32,
}

struct TcClient {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
enum TcClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The executive is not connected")]
    NotConnected,

    #[error("Could not serialize the TC: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not send the TC: {0}")]
    SendError(zmq::Error),

    #[error("No response from the executive: {0}")]
    RecvError(zmq::Error),

    #[error("The executive responded with a message which was not valid UTF-8")]
    NonUtf8Response,

    #[error("Could not deserialize the response: {0}")]
    DeserializeError(serde_json::Error),
}

/// What to do with a line entered at the prompt.
#[derive(Debug, PartialEq)]
enum Line {
    Empty,
    Help,
    Tc(Tc),
    Error(String),
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let params: CliParams =
        util::params::load("follower_cli.toml").wrap_err("Could not load CLI params")?;

    let ctx = zmq::Context::new();
    let mut client = TcClient::new(&ctx, &params).wrap_err("Failed to create the TC client")?;

    let mut rl = DefaultEditor::new().wrap_err("Failed to create the line editor")?;
    if rl.load_history(HISTORY_PATH).is_err() {
        println!("No history detected");
    }

    println!("Line follower console, connecting to {}", params.tc_endpoint);

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }

                match parse(&line) {
                    Line::Empty => (),
                    Line::Help => print_help(),
                    Line::Error(msg) => println!("{}", msg),
                    Line::Tc(tc) => match client.send(&tc) {
                        Ok(response) => print_response(&response),
                        Err(e) => println!("Error: {}", e),
                    },
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                println!("Unhandled error: {:?}", e);
                break;
            }
        }
    }

    if let Err(e) = rl.save_history(HISTORY_PATH) {
        println!("Could not save history: {}", e);
    }

    println!("Exiting...");

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TcClient {
    fn new(ctx: &zmq::Context, params: &CliParams) -> Result<Self, TcClientError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: 1000,
            linger: 1,
            recv_timeout: params.timeout_ms,
            send_timeout: params.timeout_ms,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::REQ, socket_options, &params.tc_endpoint)
            .map_err(TcClientError::SocketError)?;

        Ok(Self { socket })
    }

    fn send(&mut self, tc: &Tc) -> Result<TcResponse, TcClientError> {
        if !self.socket.connected() {
            return Err(TcClientError::NotConnected);
        }

        let tc_str = serde_json::to_string(tc).map_err(TcClientError::SerializationError)?;

        self.socket
            .send(&tc_str, 0)
            .map_err(TcClientError::SendError)?;

        let response_str = match self.socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => return Err(TcClientError::NonUtf8Response),
            Err(e) => return Err(TcClientError::RecvError(e)),
        };

        serde_json::from_str(&response_str).map_err(TcClientError::DeserializeError)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse a line entered at the prompt.
fn parse(line: &str) -> Line {
    let words: Vec<&str> = line.split_whitespace().collect();

    match words.first() {
        None => Line::Empty,
        Some(&"help") => Line::Help,
        Some(_) => {
            // StructOpt expects the program name first
            let args = std::iter::once("tc").chain(words.into_iter());

            match Tc::from_iter_safe(args) {
                Ok(tc) => Line::Tc(tc),
                Err(e) => Line::Error(e.message),
            }
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("    ping                     check the executive is alive");
    println!("    colour <colour>          look for red, yellow, blue, green or purple");
    println!("    nocolour                 stop looking for a colour");
    println!("    battery                  show the battery telemetry");
    println!("    reset <full|voltage>     reset the battery charge");
    println!("    help                     show this message");
}

fn print_response(response: &TcResponse) {
    match response {
        TcResponse::Battery(tm) => {
            println!("Battery at {}", tm.timestamp);
            println!("    charge SOC:  {:6.2} %", tm.charge_soc_percent);
            println!("    voltage SOC: {:6.2} %", tm.voltage_soc_percent);
            println!("    voltage:     {:6.2} V", tm.battery_voltage_v);
            println!("    motor power: {:6.2} W", tm.motor_power_w);
            println!("    logic power: {:6.2} W", tm.logic_power_w);
        }
        TcResponse::Unavailable => println!("No battery telemetry yet"),
        r => println!("{:?}", r),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::tc::{BatteryReset, BatteryResetArgs};

    #[test]
    fn test_parse() {
        assert_eq!(parse("   "), Line::Empty);
        assert_eq!(parse("help"), Line::Help);
        assert_eq!(parse("ping"), Line::Tc(Tc::Heartbeat));
        assert_eq!(
            parse("reset  voltage"),
            Line::Tc(Tc::ResetBattery(BatteryResetArgs {
                reset: BatteryReset::BasedOnVoltage
            }))
        );

        assert!(matches!(parse("launch"), Line::Error(_)));
        assert!(matches!(parse("colour"), Line::Error(_)));
    }
}
