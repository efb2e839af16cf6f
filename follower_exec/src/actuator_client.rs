//! # Actuator Client
//!
//! Sends navigation commands and colour triggers to the actuator controller.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::actuator::{ActuatorRequest, ActuatorResponse, ColourTrigger, NavCmd},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};

use crate::params::ExecParams;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Destination for the commands produced by the navigation and colour tasks.
pub trait CommandSink {
    /// Forward one navigation command.
    fn send_nav(&mut self, cmd: NavCmd) -> Result<(), ActuatorClientError>;

    /// Report whether the target colour was found.
    fn send_colour(&mut self, found: bool) -> Result<(), ActuatorClientError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct ActuatorClient {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum ActuatorClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the server")]
    NotConnected,

    #[error("Could not send the request to the server: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a message from the server: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the data: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the response from the server: {0}")]
    DeserializeError(serde_json::Error),

    #[error("The server responded with a message which was not valid UTF-8")]
    NonUtf8Response,

    #[error("The server rejected the request")]
    Rejected,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ActuatorClient {
    /// Create a new instance of the actuator client.
    ///
    /// Does not wait for the server to be available.
    pub fn new(ctx: &zmq::Context, params: &ExecParams) -> Result<Self, ActuatorClientError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: params.actuator_timeout_ms,
            send_timeout: params.actuator_timeout_ms,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(
            ctx,
            zmq::REQ,
            socket_options,
            &params.net.actuator_endpoint,
        )
        .map_err(ActuatorClientError::SocketError)?;

        Ok(Self { socket })
    }

    /// Send a request and wait for the server's response.
    ///
    /// Returns an error if no response arrives within the configured timeout, the request is not
    /// retried.
    pub fn send(&mut self, request: &ActuatorRequest) -> Result<(), ActuatorClientError> {
        if !self.socket.connected() {
            return Err(ActuatorClientError::NotConnected);
        }

        let request_str =
            serde_json::to_string(request).map_err(ActuatorClientError::SerializationError)?;

        self.socket
            .send(&request_str, 0)
            .map_err(ActuatorClientError::SendError)?;

        let response_str = match self.socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => return Err(ActuatorClientError::NonUtf8Response),
            Err(e) => return Err(ActuatorClientError::RecvError(e)),
        };

        match serde_json::from_str::<ActuatorResponse>(&response_str)
            .map_err(ActuatorClientError::DeserializeError)?
        {
            ActuatorResponse::Ok => Ok(()),
            ActuatorResponse::Invalid => Err(ActuatorClientError::Rejected),
        }
    }
}

impl<T: CommandSink + ?Sized> CommandSink for &mut T {
    fn send_nav(&mut self, cmd: NavCmd) -> Result<(), ActuatorClientError> {
        (**self).send_nav(cmd)
    }

    fn send_colour(&mut self, found: bool) -> Result<(), ActuatorClientError> {
        (**self).send_colour(found)
    }
}

impl CommandSink for ActuatorClient {
    fn send_nav(&mut self, cmd: NavCmd) -> Result<(), ActuatorClientError> {
        self.send(&ActuatorRequest::Nav(cmd))
    }

    fn send_colour(&mut self, found: bool) -> Result<(), ActuatorClientError> {
        self.send(&ActuatorRequest::Colour(ColourTrigger { found }))
    }
}
