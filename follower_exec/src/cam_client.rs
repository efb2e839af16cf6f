//! # Camera Client
//!
//! The camera client requests frames from the camera server and waits for them.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::cam::{CamRequest, CamResponse, ImageFormat},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};
use image::RgbImage;

use crate::params::ExecParams;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of camera frames.
pub trait FrameSource {
    /// Acquire a single frame.
    fn capture(&mut self) -> Result<RgbImage, CamClientError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The camera client
pub struct CamClient {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CamClientError {
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

    #[error("Could not decode the frame: {0}")]
    ImageDeserError(image::ImageError),

    #[error("The camera could not acquire a frame: {0}")]
    CameraError(String),

    #[error("The server responed with a message which was not valid UTF-8")]
    NonUtf8Response,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CamClient {
    /// Create a new instance of the camera client
    pub fn new(ctx: &zmq::Context, params: &ExecParams) -> Result<Self, CamClientError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: params.cam_timeout_ms,
            send_timeout: params.cam_timeout_ms,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::REQ, socket_options, &params.net.cam_endpoint)
            .map_err(CamClientError::SocketError)?;

        Ok(Self { socket })
    }
}

impl<T: FrameSource + ?Sized> FrameSource for &mut T {
    fn capture(&mut self) -> Result<RgbImage, CamClientError> {
        (**self).capture()
    }
}

impl FrameSource for CamClient {
    fn capture(&mut self) -> Result<RgbImage, CamClientError> {
        if !self.socket.connected() {
            return Err(CamClientError::NotConnected);
        }

        // PNG so that binarisation sees the pixels the camera saw
        let request_str = serde_json::to_string(&CamRequest {
            format: ImageFormat::Png,
        })
        .map_err(CamClientError::SerializationError)?;

        self.socket
            .send(&request_str, 0)
            .map_err(CamClientError::SendError)?;

        let response_str = match self.socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => return Err(CamClientError::NonUtf8Response),
            Err(e) => return Err(CamClientError::RecvError(e)),
        };

        match serde_json::from_str::<CamResponse>(&response_str)
            .map_err(CamClientError::DeserializeError)?
        {
            CamResponse::Frame(frame) => Ok(frame
                .to_cam_image()
                .map_err(CamClientError::ImageDeserError)?
                .image
                .to_rgb8()),
            CamResponse::CameraError(e) => Err(CamClientError::CameraError(e)),
        }
    }
}
