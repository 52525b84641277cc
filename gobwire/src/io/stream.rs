use {
    crate::{
        error::{message_too_large, unexpected_end, Error, Result},
        varint::{fold_be, prefix_len, MAX_UINT_BYTES},
    },
    std::io::{BufReader, ErrorKind, Read},
    tracing::trace,
};

/// Splits a byte stream into length-prefixed messages.
///
/// The underlying [`Read`] is wrapped in a [`BufReader`] so that the many
/// small reads of length prefixes do not hit the source directly.
pub(crate) struct FrameReader<R> {
    inner: BufReader<R>,
}

impl<R: Read> FrameReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
        }
    }

    pub(crate) fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }

    pub(crate) fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    /// Read the next message into `buf`, replacing its contents.
    ///
    /// Returns [`Error::Eof`] if the stream ends cleanly before a length prefix.
    pub(crate) fn read_frame(&mut self, buf: &mut Vec<u8>, limit: usize) -> Result<()> {
        let len = match self.read_len_prefix()? {
            Some(len) => len,
            None => return Err(Error::Eof),
        };
        if len > limit as u64 {
            return Err(message_too_large(len, limit));
        }
        buf.clear();
        // `len <= limit`, so it fits in usize.
        let want = len as usize;
        let read = (&mut self.inner).take(len).read_to_end(buf)?;
        if read != want {
            return Err(unexpected_end(want - read));
        }
        trace!(len, "read message frame");
        Ok(())
    }

    fn read_len_prefix(&mut self) -> Result<Option<u64>> {
        let mut lead = [0u8; 1];
        loop {
            match self.inner.read(&mut lead) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if lead[0] <= 0x7F {
            return Ok(Some(lead[0] as u64));
        }
        let n = prefix_len(lead[0])?;
        let mut magnitude = [0u8; MAX_UINT_BYTES];
        self.inner
            .read_exact(&mut magnitude[..n])
            .map_err(|e| match e.kind() {
                ErrorKind::UnexpectedEof => unexpected_end(n),
                _ => e.into(),
            })?;
        Ok(Some(fold_be(&magnitude[..n])))
    }
}
