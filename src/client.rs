use std::io::{BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};

use serde::Deserialize;
use serde_json::de::IoRead;
use serde_json::Deserializer;

use crate::common::{PoolStats, Request, Response};
use crate::{PoolError, Result};

/// The client of a job server.
pub struct JobClient {
    reader: Deserializer<IoRead<TcpStream>>,
    writer: BufWriter<TcpStream>,
}

impl JobClient {
    /// Connects to the server at the given address.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let reader_stream = TcpStream::connect(&addr)?;
        let writer_stream = reader_stream.try_clone()?;
        Ok(Self {
            reader: Deserializer::from_reader(reader_stream),
            writer: BufWriter::new(writer_stream),
        })
    }

    /// Publishes `body` on `topic`.
    ///
    /// Returns once the server has queued the message, not once a handler
    /// has processed it.
    pub fn publish(&mut self, topic: String, body: String) -> Result<()> {
        self.request(&Request::Publish { topic, body }).map(|_| ())
    }

    /// Checks that the server is up.
    pub fn ping(&mut self) -> Result<String> {
        self.request(&Request::Ping)
            .map(|reply| reply.unwrap_or_default())
    }

    /// Fetches the server pool's gauges.
    pub fn stats(&mut self) -> Result<PoolStats> {
        let reply = self
            .request(&Request::Stats)?
            .ok_or_else(|| PoolError::StringError("empty stats reply".to_owned()))?;
        Ok(serde_json::from_str(&reply)?)
    }

    fn request(&mut self, request: &Request) -> Result<Option<String>> {
        serde_json::to_writer(&mut self.writer, request)?;
        self.writer.flush()?;

        match Response::deserialize(&mut self.reader)? {
            Response::Ok(value) => Ok(value),
            Response::Err(msg) => Err(PoolError::StringError(msg)),
        }
    }
}
