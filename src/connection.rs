use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::frame::{self, Frame};

/// A TCP stream that reads and writes whole frames. Used on both sides of the wire: by the
/// server for every accepted client and by a replica talking to its master.
#[derive(Debug)]
pub struct Connection {
    pub id: Uuid,
    // Data read from the socket is buffered by the codec. When a frame is parsed, the
    // corresponding bytes are removed from the buffer.
    framed: Framed<TcpStream, FrameCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Connection {
        Connection::with_codec(stream, FrameCodec::default())
    }

    pub fn with_codec(stream: TcpStream, codec: FrameCodec) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            framed: Framed::new(stream, codec),
        }
    }

    /// Waits for the next frame. Returns `None` once the peer has closed the connection.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, frame::Error> {
        self.framed.next().await.transpose()
    }

    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), frame::Error> {
        self.framed.send(frame).await
    }
}
