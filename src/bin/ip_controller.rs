//! Inverted pendulum LQR controller served over stdin/stdout.

use pubsim::rpc::{serve, LqrController};
use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let stdin = io::stdin();
    let stdout = io::stdout();
    match serve(&LqrController, stdin.lock(), stdout.lock()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("ip_controller stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}
