#![forbid(unsafe_code)]

//! DSig context: where keys come from and which policy applies.

use sigill_core::{ns, Error};
use sigill_crypto::MacPolicy;
use sigill_keys::{default_sink, Key, KeyInfo, KeyResolverChain, SharedSink, StorageResolver};
use sigill_xml::{EventArena, NodeId};

/// ID attribute names recognised on every document.
pub const DEFAULT_ID_ATTRS: [&str; 3] = ["Id", "ID", "id"];

/// Context for XML-DSig operations.
pub struct DsigContext {
    /// Resolvers consulted when no key is supplied.
    pub chain: KeyResolverChain,
    /// Certificate storage handed to the resolvers.
    pub storage: Option<StorageResolver>,
    /// Key used directly, bypassing the chain.
    pub key: Option<Key>,
    /// MAC output-length policy.
    pub policy: MacPolicy,
    /// Additional ID attribute names, as un-namespaced or prefixed names.
    pub id_attrs: Vec<String>,
    sink: SharedSink,
}

impl DsigContext {
    /// Default resolver chain, no storage, strict MAC policy.
    pub fn new() -> Self {
        let sink = default_sink();
        Self {
            chain: KeyResolverChain::default_chain().with_sink(sink.clone()),
            storage: None,
            key: None,
            policy: MacPolicy::default(),
            id_attrs: Vec::new(),
            sink,
        }
    }

    /// Context that always uses `key`.
    pub fn with_key(key: Key) -> Self {
        Self {
            key: Some(key),
            ..Self::new()
        }
    }

    pub fn chain(mut self, chain: KeyResolverChain) -> Self {
        self.chain = chain.with_sink(self.sink.clone());
        self
    }

    pub fn storage(mut self, storage: StorageResolver) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn policy(mut self, policy: MacPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Route resolver diagnostics to `sink`.
    pub fn sink(mut self, sink: SharedSink) -> Self {
        self.chain = std::mem::take(&mut self.chain).with_sink(sink.clone());
        self.sink = sink;
        self
    }

    /// Add an ID attribute name to register during processing.
    pub fn add_id_attr(&mut self, name: &str) {
        self.id_attrs.push(name.to_owned());
    }

    /// The defaults followed by the extra names.
    pub(crate) fn all_id_attrs(&self) -> Vec<&str> {
        DEFAULT_ID_ATTRS
            .iter()
            .copied()
            .chain(self.id_attrs.iter().map(String::as_str))
            .collect()
    }

    /// The supplied key, else the chain run over `<KeyInfo>` of `signature`.
    pub(crate) fn resolve_key(&self, arena: &EventArena, signature: NodeId) -> Result<Key, Error> {
        if let Some(key) = &self.key {
            return Ok(key.clone());
        }
        let key_info = match arena.find_child(signature, ns::DSIG, ns::node::KEY_INFO) {
            Some(node) => KeyInfo::from_events(arena, node)?,
            None => KeyInfo::new(),
        };
        Ok(self.chain.resolve(&key_info, self.storage.as_ref())?)
    }
}

impl Default for DsigContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DsigContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DsigContext")
            .field("chain", &self.chain)
            .field("storage", &self.storage)
            .field("key", &self.key.as_ref().map(|k| &k.data))
            .field("policy", &self.policy)
            .field("id_attrs", &self.id_attrs)
            .finish()
    }
}
