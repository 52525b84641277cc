//! Receiving side of a stream.
use {
    crate::{
        config::Config,
        dec::DecSession,
        error::{corrupt, Error, Result},
        io::{FrameReader, Reader},
        registry::Registry,
        schema::Gob,
        types::TypeId,
    },
    std::{io::Read, mem, sync::Arc},
    tracing::{debug, trace},
};

/// Reads values from a stream of type definitions and value messages.
///
/// Type definitions are recorded as they arrive; each call returns after the
/// next value message. Errors inside a complete message fail only that call
/// and leave the stream on the next message boundary. Transport and framing
/// errors poison the decoder: later calls return [`Error::Poisoned`] until
/// [`reset`](Decoder::reset). [`Error::Eof`] marks a clean end of stream.
pub struct Decoder<R> {
    frames: FrameReader<R>,
    session: DecSession,
    buf: Vec<u8>,
    max_message_size: usize,
    poisoned: bool,
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, Config::default())
    }

    pub fn with_config(reader: R, config: Config) -> Self {
        Self {
            frames: FrameReader::new(reader),
            session: DecSession::new(config.registry),
            buf: Vec::new(),
            max_message_size: config.max_message_size,
            poisoned: false,
        }
    }

    /// Decode the next value into `dst`.
    ///
    /// Fields absent from the message keep their current contents.
    pub fn decode<T: Gob>(&mut self, dst: &mut T) -> Result<()> {
        self.decode_dyn(dst)
    }

    pub fn decode_dyn(&mut self, dst: &mut dyn Gob) -> Result<()> {
        self.next(Some(dst))
    }

    /// Decode the next value into a fresh zero value of `T`.
    pub fn decode_value<T: Gob>(&mut self) -> Result<T> {
        let mut value = T::zero();
        self.decode(&mut value)?;
        Ok(value)
    }

    /// Consume the next value without storing it.
    ///
    /// Type definitions that precede or are nested in it are still recorded.
    pub fn skip(&mut self) -> Result<()> {
        self.next(None)
    }

    /// Clear the poisoned state. Received type definitions stay recorded.
    pub fn reset(&mut self) {
        self.poisoned = false;
        self.buf.clear();
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.session.registry()
    }

    pub fn get_ref(&self) -> &R {
        self.frames.get_ref()
    }

    /// The underlying reader. Bytes buffered but not yet decoded are lost.
    pub fn into_inner(self) -> R {
        self.frames.into_inner()
    }

    fn next(&mut self, dst: Option<&mut dyn Gob>) -> Result<()> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }
        let mut buf = mem::take(&mut self.buf);
        let result = self.next_value(&mut buf, dst);
        self.buf = buf;
        result
    }

    fn next_value(&mut self, buf: &mut Vec<u8>, dst: Option<&mut dyn Gob>) -> Result<()> {
        loop {
            if let Err(e) = self.frames.read_frame(buf, self.max_message_size) {
                if !matches!(e, Error::Eof) {
                    self.poisoned = true;
                    debug!(error = %e, "decoder poisoned");
                }
                return Err(e);
            }
            let mut r = Reader::new(buf);
            let id = r.read_type_id()?;
            trace!(%id, len = buf.len(), "read message");
            if id.0 < 0 {
                let id = id
                    .0
                    .checked_neg()
                    .map(TypeId)
                    .ok_or_else(|| corrupt("type id out of range"))?;
                self.session.recv_type(id, r.as_slice())?;
                continue;
            }
            return match dst {
                Some(dst) => self.session.decode_value(&mut r, id, dst),
                None => self.session.ignore_value(&mut r, id),
            };
        }
    }
}
