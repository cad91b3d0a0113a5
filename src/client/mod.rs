//! ECP client session
//!
//! One [`Client`] per transport pairing. The session is strictly half-duplex:
//! every operation performs at most a handful of synchronous request/response
//! exchanges and blocks until the transport answers. Catalogs are rebuilt
//! wholesale from server responses; entity handles are validated against them
//! before any byte reaches the wire.

mod buffer;
mod catalog;
mod entity;
mod ops;
mod transport;

pub use entity::{Curve, CurveChecksum, Function, FunctionOutcome, Group, Variable, Version};
pub use transport::Transport;

use bytes::Bytes;
use tracing::{debug, instrument, trace};

use crate::protocol::{
    self, CURVE_LIST_ENTRY, CURVE_CSUM_SIZE, CURVE_MAX_BLOCKS, CommandCode, Error, Message, Result,
    SIZE_MASK, VAR_MAX_SIZE, WRITABLE_MASK,
};

use buffer::FramePool;
use catalog::Catalog;

/// Most entries any catalog can hold: entity ids are one byte on the wire.
const MAX_ENTRIES: usize = 256;

/// ECP client session over an injected transport
///
/// Construct with [`Client::new`], then call [`Client::init`] once before any
/// entity operation. A session assumes single-threaded use with one
/// outstanding request at a time; callers needing concurrency serialize
/// externally or use one session per transport.
#[derive(Debug)]
pub struct Client<T: Transport> {
    transport: T,
    frames: FramePool,
    initialized: bool,
    version: Version,
    variables: Catalog<Variable>,
    groups: Catalog<Group>,
    curves: Catalog<Curve>,
    functions: Catalog<Function>,
}

impl<T: Transport> Client<T> {
    /// Create a session over `transport`. No bytes are exchanged until
    /// [`Client::init`].
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            frames: FramePool::new(),
            initialized: false,
            version: Version::default(),
            variables: Catalog::new(),
            groups: Catalog::new(),
            curves: Catalog::new(),
            functions: Catalog::new(),
        }
    }

    /// Whether [`Client::init`] has completed since construction or the last
    /// re-initialization attempt.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Server protocol version; meaningful once initialized.
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Current variable catalog.
    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        self.variables.entries()
    }

    /// Current group catalog.
    #[must_use]
    pub fn groups(&self) -> &[Group] {
        self.groups.entries()
    }

    /// Current curve catalog.
    #[must_use]
    pub fn curves(&self) -> &[Curve] {
        self.curves.entries()
    }

    /// Current function catalog.
    #[must_use]
    pub fn functions(&self) -> &[Function] {
        self.functions.entries()
    }

    /// Initialize the session: version query, then the variable, group,
    /// curve, and function catalogs, strictly in that order.
    ///
    /// Aborts on the first failure and leaves the session not-initialized.
    /// Calling `init` again re-runs the whole sequence; all previously issued
    /// entity handles are invalidated by the catalog rebuild.
    pub fn init(&mut self) -> Result<()> {
        self.initialized = false;

        self.query_version()?;
        self.update_variables()?;
        self.update_groups()?;
        self.update_curves()?;
        self.update_functions()?;

        self.initialized = true;
        debug!(
            version = %self.version,
            variables = self.variables.len(),
            groups = self.groups.len(),
            curves = self.curves.len(),
            functions = self.functions.len(),
            "session initialized"
        );
        Ok(())
    }

    /// Re-fetch the group catalog from the server.
    ///
    /// Use after a group mutation whose automatic follow-up refresh failed
    /// and left the client-side catalog empty.
    pub fn refresh_groups(&mut self) -> Result<()> {
        self.guard_initialized()?;
        self.update_groups()
    }

    /// Re-fetch the curve catalog (including checksums) from the server.
    ///
    /// Use after a checksum recomputation whose automatic follow-up refresh
    /// failed.
    pub fn refresh_curves(&mut self) -> Result<()> {
        self.guard_initialized()?;
        self.update_curves()
    }

    fn guard_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    /// One synchronous round trip: encode, send, receive, decode.
    #[instrument(level = "trace", skip(self, request), fields(code = request.code()))]
    fn exchange(&mut self, request: &Message) -> Result<Message> {
        let frame = protocol::encode(request)?;
        self.transport.send(&frame)?;

        let mut lease = self.frames.acquire();
        let received = self.transport.receive(lease.as_mut_slice())?;
        lease.set_len(received);

        let response = protocol::decode(lease.filled())?;
        trace!(
            code = response.code(),
            payload = response.payload().len(),
            "received response"
        );
        Ok(response)
    }

    fn expect_reply(response: &Message, expected: CommandCode) -> Result<()> {
        if response.is(expected) {
            Ok(())
        } else {
            Err(Error::UnexpectedReply {
                expected,
                got: response.code(),
            })
        }
    }

    fn query_version(&mut self) -> Result<()> {
        let response = self.exchange(&Message::new(CommandCode::QueryVersion, Bytes::new()))?;

        // Servers predating the version command answer OpNotSupported.
        if response.is(CommandCode::OpNotSupported) {
            self.version = Version {
                major: 1,
                minor: 0,
                revision: 0,
            };
            return Ok(());
        }

        let payload = response.payload();
        if payload.len() < 3 {
            return Err(Error::ResponseTooShort {
                needed: 3,
                got: payload.len(),
            });
        }

        self.version = Version {
            major: payload[0],
            minor: payload[1],
            revision: payload[2],
        };
        Ok(())
    }

    fn update_variables(&mut self) -> Result<()> {
        let response = self.exchange(&Message::new(CommandCode::VarQueryList, Bytes::new()))?;
        Self::expect_reply(&response, CommandCode::VarList)?;

        let payload = response.payload();
        if payload.len() > MAX_ENTRIES {
            return Err(Error::CatalogOverflow {
                entity: "variable",
                count: payload.len(),
            });
        }

        let generation = self.variables.next_generation();
        let variables = payload
            .iter()
            .enumerate()
            .map(|(slot, &packed)| {
                let size = usize::from(packed & SIZE_MASK);
                Variable {
                    index: slot as u8,
                    generation,
                    writable: packed & WRITABLE_MASK != 0,
                    size: if size == 0 { VAR_MAX_SIZE } else { size },
                }
            })
            .collect();

        self.variables.replace(variables);
        // Group members reference the variable catalog that just went away.
        self.groups.clear();

        debug!(count = self.variables.len(), "refreshed variable catalog");
        Ok(())
    }

    fn update_groups(&mut self) -> Result<()> {
        match self.load_groups() {
            Ok(groups) => {
                debug!(count = groups.len(), "refreshed group catalog");
                self.groups.replace(groups);
                Ok(())
            }
            Err(err) => {
                // Partial catalogs are never exposed.
                self.groups.clear();
                Err(err)
            }
        }
    }

    fn load_groups(&mut self) -> Result<Vec<Group>> {
        let response = self.exchange(&Message::new(CommandCode::GroupQueryList, Bytes::new()))?;
        Self::expect_reply(&response, CommandCode::GroupList)?;

        let descriptors = response.payload().clone();
        if descriptors.len() > MAX_ENTRIES {
            return Err(Error::CatalogOverflow {
                entity: "group",
                count: descriptors.len(),
            });
        }

        let generation = self.groups.next_generation();
        let mut groups = Vec::with_capacity(descriptors.len());

        for (slot, &packed) in descriptors.iter().enumerate() {
            let index = slot as u8;
            let members = self.query_group_members(index)?;

            let declared = usize::from(packed & SIZE_MASK);
            if declared != members.len() {
                trace!(
                    group = index,
                    declared,
                    actual = members.len(),
                    "group list and membership reply disagree on member count"
                );
            }

            let size = members.iter().map(Variable::size).sum();
            groups.push(Group {
                index,
                generation,
                writable: packed & WRITABLE_MASK != 0,
                size,
                members,
            });
        }

        Ok(groups)
    }

    fn query_group_members(&mut self, group: u8) -> Result<Vec<Variable>> {
        let response = self.exchange(&Message::new(CommandCode::GroupQuery, vec![group]))?;
        Self::expect_reply(&response, CommandCode::Group)?;

        let ids = response.payload().clone();
        let mut members = Vec::with_capacity(ids.len());
        for &id in &ids {
            let variable = self
                .variables
                .get(usize::from(id))
                .copied()
                .ok_or(Error::UnknownMember { group, id })?;
            members.push(variable);
        }
        Ok(members)
    }

    fn update_curves(&mut self) -> Result<()> {
        let response = self.exchange(&Message::new(CommandCode::CurveQueryList, Bytes::new()))?;
        Self::expect_reply(&response, CommandCode::CurveList)?;

        let payload = response.payload().clone();
        let count = payload.len() / CURVE_LIST_ENTRY;
        if count > MAX_ENTRIES {
            return Err(Error::CatalogOverflow {
                entity: "curve",
                count,
            });
        }

        let generation = self.curves.next_generation();
        let mut curves = Vec::with_capacity(count);

        for (slot, record) in payload.chunks_exact(CURVE_LIST_ENTRY).enumerate() {
            let index = slot as u8;
            let nblocks = u16::from_be_bytes([record[3], record[4]]);

            curves.push(Curve {
                index,
                generation,
                writable: record[0] != 0,
                block_size: usize::from(u16::from_be_bytes([record[1], record[2]])),
                nblocks: if nblocks == 0 {
                    CURVE_MAX_BLOCKS
                } else {
                    u32::from(nblocks)
                },
                checksum: self.query_curve_checksum(index),
            });
        }

        self.curves.replace(curves);
        debug!(count = self.curves.len(), "refreshed curve catalog");
        Ok(())
    }

    /// Checksum fetch failures are non-fatal: the curve stays usable, its
    /// checksum stays unset until the next successful refresh.
    fn query_curve_checksum(&mut self, curve: u8) -> Option<CurveChecksum> {
        let response = self
            .exchange(&Message::new(CommandCode::CurveQueryCsum, vec![curve]))
            .ok()?;
        if !response.is(CommandCode::CurveCsum) {
            return None;
        }

        let payload = response.payload();
        if payload.len() < CURVE_CSUM_SIZE {
            trace!(curve, got = payload.len(), "short checksum reply");
            return None;
        }

        let mut checksum = [0u8; CURVE_CSUM_SIZE];
        checksum.copy_from_slice(&payload[..CURVE_CSUM_SIZE]);
        Some(checksum)
    }

    fn update_functions(&mut self) -> Result<()> {
        let response = self.exchange(&Message::new(CommandCode::FuncQueryList, Bytes::new()))?;
        Self::expect_reply(&response, CommandCode::FuncList)?;

        let payload = response.payload();
        if payload.len() > MAX_ENTRIES {
            return Err(Error::CatalogOverflow {
                entity: "function",
                count: payload.len(),
            });
        }

        let generation = self.functions.next_generation();
        let functions = payload
            .iter()
            .enumerate()
            .map(|(slot, &packed)| Function {
                index: slot as u8,
                generation,
                input_size: usize::from(packed >> 4),
                output_size: usize::from(packed & 0x0F),
            })
            .collect();

        self.functions.replace(functions);
        debug!(count = self.functions.len(), "refreshed function catalog");
        Ok(())
    }
}
