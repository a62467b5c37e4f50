//! Client-side connection helpers: dialing the server and length-prefixed
//! message framing.

use std::net::SocketAddr;

use crate::utils::BenchError;

use bytes::{Buf, Bytes, BytesMut};

use serde::de::DeserializeOwned;
use serde::Serialize;

use rmp_serde::decode::from_slice as decode_from_slice;
use rmp_serde::encode::to_vec_named as encode_to_vec;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::{self, Duration};

/// Length of the frame length prefix in bytes.
const LEN_PREFIX: usize = 8;

/// Largest frame body accepted from the server. A length prefix above this
/// means the stream is corrupt.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Wrapper over tokio `TcpSocket::connect()` that provides a retrying logic.
/// Fails after `retries` additional unsuccessful attempts.
pub async fn tcp_connect_with_retry(
    conn_addr: SocketAddr,
    mut retries: u8,
) -> Result<TcpStream, BenchError> {
    loop {
        let socket = if conn_addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_nodelay(true)?;

        match socket.connect(conn_addr).await {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                if retries == 0 {
                    return Err(BenchError::msg(format!(
                        "error connecting to server {}: {}",
                        conn_addr, err
                    )));
                }
                retries -= 1;
                time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Encodes an object into a self-describing (named-field MessagePack) frame
/// body.
pub fn encode_frame<T: Serialize>(obj: &T) -> Result<Vec<u8>, BenchError> {
    Ok(encode_to_vec(obj)?)
}

/// Decodes an object from a frame body.
pub fn decode_frame<T: DeserializeOwned>(body: &[u8]) -> Result<T, BenchError> {
    Ok(decode_from_slice(body)?)
}

/// Writes an object as one frame: 8-byte big-endian length followed by the
/// encoded body. Does not flush.
pub async fn write_frame<T, Conn>(
    obj: &T,
    conn_write: &mut Conn,
) -> Result<(), BenchError>
where
    T: Serialize,
    Conn: AsyncWrite + Unpin,
{
    let obj_bytes = encode_frame(obj)?;
    conn_write.write_u64(obj_bytes.len() as u64).await?; // send length first
    conn_write.write_all(&obj_bytes[..]).await?;
    Ok(())
}

/// Reads length-prefixed frames from a readable connection, keeping partially
/// read bytes in an internal buffer across calls.
#[derive(Debug)]
pub struct FrameReader<Conn> {
    /// Readable half of the connection.
    conn_read: Conn,

    /// Buffer storage for partial reads.
    read_buf: BytesMut,
}

impl<Conn> FrameReader<Conn>
where
    Conn: AsyncRead + Unpin,
{
    /// Creates a new frame reader over given readable connection.
    pub fn new(conn_read: Conn) -> Self {
        FrameReader {
            conn_read,
            read_buf: BytesMut::with_capacity(LEN_PREFIX + 1024),
        }
    }

    /// Reads more bytes into the buffer; a zero-length read means the peer
    /// has closed the connection.
    async fn fill_buf(&mut self) -> Result<(), BenchError> {
        if self.conn_read.read_buf(&mut self.read_buf).await? == 0 {
            return Err(BenchError::msg("connection closed by peer"));
        }
        Ok(())
    }

    /// Reads the next frame body. Errors returned are stream failures; the
    /// body itself is not interpreted.
    ///
    /// CANCELLATION SAFETY: we avoid `read_u64()` and `read_exact()` here so
    /// that this can be used as a `tokio::select!` branch; bytes already
    /// read before a cancellation stay in the read buffer.
    pub async fn read_frame(&mut self) -> Result<Bytes, BenchError> {
        // read length of frame first
        while self.read_buf.len() < LEN_PREFIX {
            self.fill_buf().await?;
        }
        let mut len_bytes = &self.read_buf[..LEN_PREFIX];
        let frame_len = len_bytes.get_u64();
        if frame_len > MAX_FRAME_LEN as u64 {
            return Err(BenchError::msg(format!(
                "frame length {} exceeds max {}, stream corrupt",
                frame_len, MAX_FRAME_LEN
            )));
        }
        let frame_len = frame_len as usize;

        // then read the frame body itself
        let frame_end = LEN_PREFIX + frame_len;
        if self.read_buf.capacity() < frame_end {
            self.read_buf.reserve(frame_end - self.read_buf.len());
        }
        while self.read_buf.len() < frame_end {
            self.fill_buf().await?;
        }

        // no further cancellation possible beyond this point
        self.read_buf.advance(LEN_PREFIX);
        Ok(self.read_buf.split_to(frame_len).freeze())
    }

    /// Reads the next frame and decodes it as an object of type `T`.
    pub async fn read_obj<T: DeserializeOwned>(
        &mut self,
    ) -> Result<T, BenchError> {
        let body = self.read_frame().await?;
        decode_frame(&body)
    }
}

#[cfg(test)]
mod apistub_tests {
    use super::*;
    use serde::Deserialize;
    use tokio::net::TcpListener;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Dummy {
        id: u64,
        name: String,
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn frames_over_duplex() -> Result<(), BenchError> {
        let (client, server) = tokio::io::duplex(64);
        let (_, mut conn_write) = tokio::io::split(client);
        let (conn_read, _) = tokio::io::split(server);
        let writer = tokio::spawn(async move {
            for id in 0..20 {
                let obj = Dummy {
                    id,
                    name: "x".repeat(id as usize * 10),
                };
                write_frame(&obj, &mut conn_write).await?;
            }
            conn_write.flush().await?;
            Ok::<(), BenchError>(())
        });

        let mut reader = FrameReader::new(conn_read);
        for id in 0..20 {
            let obj: Dummy = reader.read_obj().await?;
            assert_eq!(obj.id, id);
            assert_eq!(obj.name.len(), id as usize * 10);
        }
        writer.await??;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn undecodable_frame_keeps_stream_aligned() -> Result<(), BenchError> {
        let (client, server) = tokio::io::duplex(1024);
        let (_, mut conn_write) = tokio::io::split(client);
        let (conn_read, _) = tokio::io::split(server);

        // garbage body with a correct length prefix, then a valid frame
        conn_write.write_u64(3).await?;
        conn_write.write_all(&[0xc1, 0xc1, 0xc1]).await?;
        write_frame(
            &Dummy {
                id: 9,
                name: "ok".into(),
            },
            &mut conn_write,
        )
        .await?;

        let mut reader = FrameReader::new(conn_read);
        assert!(reader.read_obj::<Dummy>().await.is_err());
        let obj: Dummy = reader.read_obj().await?;
        assert_eq!(obj.id, 9);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn oversized_length_prefix_rejected() -> Result<(), BenchError> {
        let (client, server) = tokio::io::duplex(64);
        let (_, mut conn_write) = tokio::io::split(client);
        let (conn_read, _) = tokio::io::split(server);
        conn_write.write_u64(1 << 45).await?;
        conn_write.write_all(&[0u8; 16]).await?;

        let mut reader = FrameReader::new(conn_read);
        let err = reader.read_frame().await.unwrap_err();
        assert!(err.to_string().contains("exceeds max"));
        assert!(reader.read_buf.capacity() < MAX_FRAME_LEN);

        let (client, server) = tokio::io::duplex(64);
        let (_, mut conn_write) = tokio::io::split(client);
        let (conn_read, _) = tokio::io::split(server);
        conn_write.write_u64(u64::MAX).await?;
        let mut reader = FrameReader::new(conn_read);
        assert!(reader.read_frame().await.is_err());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn closed_stream_errors() -> Result<(), BenchError> {
        let (client, server) = tokio::io::duplex(64);
        drop(client);
        let mut reader = FrameReader::new(server);
        assert!(reader.read_frame().await.is_err());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn connect_with_retry() -> Result<(), BenchError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let accepter = tokio::spawn(async move { listener.accept().await });
        let stream = tcp_connect_with_retry(addr, 0).await?;
        assert_eq!(stream.peer_addr()?, addr);
        accepter.await??;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn connect_failure_reported() -> Result<(), BenchError> {
        // grab a free port and close it again so nothing is listening
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await?;
            listener.local_addr()?
        };
        assert!(tcp_connect_with_retry(addr, 0).await.is_err());
        Ok(())
    }
}
