use std::collections::HashMap;
use zlomek_protocol::ops::FunctionCode;
use zlomek_protocol::wire::Decoder;
use zlomek_protocol::ErrorKind;

/// A registered one-way handler: decodes its own arguments from the message
/// body and acts on them. Errors are logged by the caller but never fail the
/// delivering write.
pub type OneWayHandler = Box<dyn Fn(&mut Decoder) -> Result<(), ErrorKind> + Send + Sync>;

/// Table of one-way handlers keyed by function code. Registration happens
/// once at construction and the table is immutable thereafter.
pub struct OneWayRegistry {
    handlers: HashMap<u32, OneWayHandler>,
}

impl OneWayRegistry {
    /// Builds a registry with the built-in `invalidate` handler forwarding
    /// to `on_invalidate`, the single seam to the adapter's dentry/inode
    /// cache.
    pub fn new<F>(on_invalidate: F) -> Self
    where
        F: Fn(zlomek_protocol::FileHandle) + Send + Sync + 'static,
    {
        let mut handlers: HashMap<u32, OneWayHandler> = HashMap::new();
        handlers.insert(
            FunctionCode::Invalidate as u32,
            Box::new(move |dec: &mut Decoder| {
                let args: zlomek_protocol::ops::invalidate::Args = dec.decode()?;
                on_invalidate(args.handle);
                Ok(())
            }),
        );
        Self { handlers }
    }

    /// Registers an additional one-way handler for `code`. Intended to be
    /// called only while building the registry, before it is shared across
    /// threads; the function-code set beyond `invalidate` is left open for
    /// callers to extend.
    pub fn with_handler<F>(mut self, code: u32, handler: F) -> Self
    where
        F: Fn(&mut Decoder) -> Result<(), ErrorKind> + Send + Sync + 'static,
    {
        self.handlers.insert(code, Box::new(handler));
        self
    }

    pub fn dispatch(&self, code: u32, dec: &mut Decoder) -> Result<(), ErrorKind> {
        match self.handlers.get(&code) {
            Some(handler) => handler(dec),
            None => Err(ErrorKind::ProtocolError("no handler registered for one-way function code")),
        }
    }
}
