//! # Telecommand Server
//!
//! Receives telecommands from the operator console. The console connects to the executive's
//! bound REP socket, so the executive keeps running whether or not an operator is attached.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    tc::{Tc, TcParseError, TcResponse},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// How long a receive waits for a TC, bounding how quickly the executive notices shutdown.
const TC_RECV_TIMEOUT_MS: i32 = 100;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telecommand server
pub struct TcServer {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TcServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send the response: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a message from the console: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the data: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not parse the recieved telecommand: {0}")]
    TcParseError(TcParseError),

    #[error("The console sent a message which was not valid UTF-8")]
    NonUtf8Tc,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TcServer {
    /// Bind the server to the given endpoint.
    pub fn new(ctx: &zmq::Context, endpoint: &str) -> Result<Self, TcServerError> {
        let socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            linger: 1,
            recv_timeout: TC_RECV_TIMEOUT_MS,
            send_timeout: TC_RECV_TIMEOUT_MS,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::REP, socket_options, endpoint)
            .map_err(TcServerError::SocketError)?;

        Ok(Self { socket })
    }

    /// Recieve a single TC.
    ///
    /// Returns `Ok(None)` if no TC arrived within the receive timeout.
    ///
    /// After recieving a valid TC the server must send a response using `.send_response()` before
    /// attempting to recieve another TC. If the TC is invalid the `Invalid` response is sent by
    /// this function.
    pub fn receive_tc(&self) -> Result<Option<Tc>, TcServerError> {
        let tc_str = match self.socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                self.send_response(&TcResponse::Invalid)?;
                return Err(TcServerError::NonUtf8Tc);
            }
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(TcServerError::RecvError(e)),
        };

        match Tc::from_json(&tc_str) {
            Ok(tc) => Ok(Some(tc)),
            Err(e) => {
                self.send_response(&TcResponse::Invalid)?;
                Err(TcServerError::TcParseError(e))
            }
        }
    }

    /// Send the response to the last TC.
    pub fn send_response(&self, response: &TcResponse) -> Result<(), TcServerError> {
        let response_str =
            serde_json::to_string(response).map_err(TcServerError::SerializationError)?;

        self.socket
            .send(&response_str, 0)
            .map_err(TcServerError::SendError)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tc_exchange() {
        let ctx = zmq::Context::new();
        let server = TcServer::new(&ctx, "inproc://tc_server_test").unwrap();

        let console = ctx.socket(zmq::REQ).unwrap();
        console.set_linger(0).unwrap();
        console.set_rcvtimeo(2000).unwrap();
        console.connect("inproc://tc_server_test").unwrap();

        // Nothing sent yet
        assert!(server.receive_tc().unwrap().is_none());

        console
            .send(&serde_json::to_string(&Tc::QueryBattery).unwrap(), 0)
            .unwrap();

        let mut tc = None;
        for _ in 0..20 {
            tc = server.receive_tc().unwrap();
            if tc.is_some() {
                break;
            }
        }
        assert_eq!(tc, Some(Tc::QueryBattery));

        server.send_response(&TcResponse::Unavailable).unwrap();
        let response = console.recv_string(0).unwrap().unwrap();
        assert_eq!(
            serde_json::from_str::<TcResponse>(&response).unwrap(),
            TcResponse::Unavailable
        );

        // Garbage is answered with Invalid
        console.send("{\"SelfDestruct\":null}", 0).unwrap();
        let mut result = server.receive_tc();
        for _ in 0..20 {
            if !matches!(result, Ok(None)) {
                break;
            }
            result = server.receive_tc();
        }
        assert!(matches!(result, Err(TcServerError::TcParseError(_))));

        let response = console.recv_string(0).unwrap().unwrap();
        assert_eq!(
            serde_json::from_str::<TcResponse>(&response).unwrap(),
            TcResponse::Invalid
        );
    }
}
