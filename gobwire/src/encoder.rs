//! Sending side of a stream.
use {
    crate::{
        config::Config,
        enc::EncState,
        error::{Error, Result},
        registry::Registry,
        schema::Gob,
        types::TypeId,
    },
    std::{collections::HashSet, io::Write, sync::Arc},
    tracing::{debug, trace},
};

/// Writes values, preceded by the type descriptors the peer has not seen yet.
///
/// Each call to [`encode`](Encoder::encode) assembles all of its messages in
/// one buffer and hands them to the writer with a single `write_all`. If
/// encoding fails nothing is written, and the descriptors the call would have
/// sent are sent again by the next call. A failed write poisons the encoder:
/// later calls return [`Error::Poisoned`] until [`reset`](Encoder::reset).
///
/// ```
/// # use gobwire::{Decoder, Encoder, Gob};
/// #[derive(Gob, Debug, PartialEq)]
/// struct Point {
///     x: i64,
///     y: i64,
/// }
///
/// let mut enc = Encoder::new(Vec::new());
/// enc.encode(&Point { x: 3, y: 0 }).unwrap();
/// enc.encode(&Point { x: 1, y: 2 }).unwrap();
///
/// let bytes = enc.into_inner();
/// let mut dec = Decoder::new(bytes.as_slice());
/// assert_eq!(dec.decode_value::<Point>().unwrap(), Point { x: 3, y: 0 });
/// assert_eq!(dec.decode_value::<Point>().unwrap(), Point { x: 1, y: 2 });
/// ```
pub struct Encoder<W> {
    writer: W,
    registry: Arc<Registry>,
    /// Ids whose descriptors the peer already has.
    sent: HashSet<TypeId>,
    buf: Vec<u8>,
    max_message_size: usize,
    poisoned: bool,
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W) -> Self {
        Self::with_config(writer, Config::default())
    }

    pub fn with_config(writer: W, config: Config) -> Self {
        Self {
            writer,
            registry: config.registry,
            sent: HashSet::new(),
            buf: Vec::new(),
            max_message_size: config.max_message_size,
            poisoned: false,
        }
    }

    pub fn encode<T: Gob>(&mut self, value: &T) -> Result<()> {
        self.encode_dyn(value)
    }

    pub fn encode_dyn(&mut self, value: &dyn Gob) -> Result<()> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }
        self.buf.clear();
        let mut fresh = Vec::new();
        let mut state = EncState {
            registry: &self.registry,
            sent: &mut self.sent,
            fresh: &mut fresh,
            limit: self.max_message_size,
        };
        if let Err(e) = state.encode_message(&mut self.buf, value) {
            for id in fresh {
                self.sent.remove(&id);
            }
            return Err(e);
        }
        trace!(len = self.buf.len(), "writing messages");
        if let Err(e) = self.writer.write_all(&self.buf) {
            self.poisoned = true;
            debug!(error = %e, "encoder poisoned");
            return Err(e.into());
        }
        Ok(())
    }

    /// Clear the poisoned state. Type descriptors already sent stay recorded.
    pub fn reset(&mut self) {
        self.poisoned = false;
        self.buf.clear();
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{Decoder, Interface},
        std::io,
    };

    #[derive(crate::Gob, Debug, Default, PartialEq)]
    struct Point {
        x: i64,
        y: i64,
    }

    #[derive(crate::Gob, Debug, Default)]
    struct Holder {
        value: Interface,
    }

    fn isolated() -> Config {
        Config::default().registry(Arc::new(Registry::new()))
    }

    #[test]
    fn point_stream_bytes() {
        let mut enc = Encoder::with_config(Vec::new(), isolated());
        enc.encode(&Point { x: 3, y: 0 }).unwrap();
        let first = enc.get_ref().len();
        assert!(first > 6);
        enc.encode(&Point { x: 3, y: 0 }).unwrap();
        assert_eq!(&enc.get_ref()[first..], [0x05, 0xFF, 0x80, 0x01, 0x06, 0x00]);
        // The descriptor message announces id 64 as int(-64).
        assert_eq!(enc.get_ref()[1], 0x7F);
    }

    #[test]
    fn builtin_values_send_no_descriptor() {
        let mut enc = Encoder::with_config(Vec::new(), isolated());
        enc.encode(&127u64).unwrap();
        assert_eq!(enc.get_ref(), &[0x03, 0x06, 0x00, 0x7F]);
    }

    #[test]
    fn failed_encode_writes_nothing_and_resends_types() {
        let config = isolated();
        let registry = config.registry.clone();
        let mut enc = Encoder::with_config(Vec::new(), config);
        let bad = Holder {
            value: Interface::new(Point::default()),
        };
        assert!(matches!(
            enc.encode(&bad),
            Err(Error::UnregisteredInterfaceType(_))
        ));
        assert!(enc.get_ref().is_empty());

        registry.register::<Point>().unwrap();
        enc.encode(&bad).unwrap();
        let mut dec = Decoder::with_config(
            enc.get_ref().as_slice(),
            Config::default().registry(registry),
        );
        let got: Holder = dec.decode_value().unwrap();
        assert_eq!(got.value.downcast_ref::<Point>(), Some(&Point::default()));
    }

    #[test]
    fn oversized_message_rejected() {
        let mut enc = Encoder::with_config(Vec::new(), isolated().max_message_size(8));
        assert!(matches!(
            enc.encode(&vec![1u8; 64]),
            Err(Error::MessageTooLarge { .. })
        ));
        assert!(!enc.is_poisoned());
        enc.encode(&vec![1u8; 2]).unwrap();
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_poisons() {
        let mut enc = Encoder::with_config(Broken, isolated());
        assert!(matches!(enc.encode(&1u8), Err(Error::Io(_))));
        assert!(matches!(enc.encode(&1u8), Err(Error::Poisoned)));
        enc.reset();
        assert!(matches!(enc.encode(&1u8), Err(Error::Io(_))));
    }
}
