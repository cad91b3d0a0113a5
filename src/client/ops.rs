//! Entity operations
//!
//! Every operation validates locally — initialized session, handle is a live
//! catalog entry, writability, sizes and ranges — before touching the
//! transport. A request the client already knows is invalid never produces a
//! round trip.

use bytes::Bytes;
use tracing::debug;

use crate::protocol::{BinOp, CURVE_BLOCK_INFO, CommandCode, Error, Message, Result};

use super::entity::{Curve, Function, FunctionOutcome, Group, Variable};
use super::{Client, Transport};

impl<T: Transport> Client<T> {
    /// Read a variable's current value.
    ///
    /// Returns the value bytes verbatim; interpreting them is the caller's
    /// concern.
    pub fn read_variable(&mut self, variable: &Variable) -> Result<Bytes> {
        self.guard_initialized()?;
        self.require_variable(variable)?;

        let response = self.exchange(&Message::new(CommandCode::VarRead, vec![variable.index]))?;
        Self::expect_reply(&response, CommandCode::VarValue)?;
        Ok(response.payload().clone())
    }

    /// Write a variable's value. `value` must be exactly the variable's size.
    pub fn write_variable(&mut self, variable: &Variable, value: &[u8]) -> Result<()> {
        self.guard_initialized()?;
        self.require_writable_variable(variable)?;
        Self::require_size(variable.size, value)?;

        let mut payload = Vec::with_capacity(1 + value.len());
        payload.push(variable.index);
        payload.extend_from_slice(value);

        let response = self.exchange(&Message::new(CommandCode::VarWrite, payload))?;
        Self::expect_reply(&response, CommandCode::Ok)
    }

    /// Write one variable and read another in a single round trip.
    ///
    /// The write target must be writable; both variables must be live catalog
    /// entries. Returns the read variable's value bytes.
    pub fn write_read_variables(
        &mut self,
        write_variable: &Variable,
        write_value: &[u8],
        read_variable: &Variable,
    ) -> Result<Bytes> {
        self.guard_initialized()?;
        self.require_writable_variable(write_variable)?;
        self.require_variable(read_variable)?;
        Self::require_size(write_variable.size, write_value)?;

        let mut payload = Vec::with_capacity(2 + write_value.len());
        payload.push(write_variable.index);
        payload.push(read_variable.index);
        payload.extend_from_slice(write_value);

        let response = self.exchange(&Message::new(CommandCode::VarWriteRead, payload))?;
        Self::expect_reply(&response, CommandCode::VarValue)?;
        Ok(response.payload().clone())
    }

    /// Read all of a group's member values as one contiguous buffer.
    pub fn read_group(&mut self, group: &Group) -> Result<Bytes> {
        self.guard_initialized()?;
        self.require_group(group)?;

        let response = self.exchange(&Message::new(CommandCode::GroupRead, vec![group.index]))?;
        Self::expect_reply(&response, CommandCode::GroupValues)?;
        Ok(response.payload().clone())
    }

    /// Write all of a group's member values. `values` must be exactly the
    /// group's size (the sum of its member sizes).
    pub fn write_group(&mut self, group: &Group, values: &[u8]) -> Result<()> {
        self.guard_initialized()?;
        self.require_writable_group(group)?;
        Self::require_size(group.size, values)?;

        let mut payload = Vec::with_capacity(1 + values.len());
        payload.push(group.index);
        payload.extend_from_slice(values);

        let response = self.exchange(&Message::new(CommandCode::GroupWrite, payload))?;
        Self::expect_reply(&response, CommandCode::Ok)
    }

    /// Apply a bitwise operation to a variable. `mask` must be exactly the
    /// variable's size.
    pub fn bin_op_variable(&mut self, variable: &Variable, op: BinOp, mask: &[u8]) -> Result<()> {
        self.guard_initialized()?;
        self.require_writable_variable(variable)?;
        Self::require_size(variable.size, mask)?;

        let mut payload = Vec::with_capacity(2 + mask.len());
        payload.push(variable.index);
        payload.push(op.tag());
        payload.extend_from_slice(mask);

        let response = self.exchange(&Message::new(CommandCode::VarBinOp, payload))?;
        Self::expect_reply(&response, CommandCode::Ok)
    }

    /// Apply a bitwise operation to every member of a group. `mask` must be
    /// exactly the group's size.
    pub fn bin_op_group(&mut self, group: &Group, op: BinOp, mask: &[u8]) -> Result<()> {
        self.guard_initialized()?;
        self.require_writable_group(group)?;
        Self::require_size(group.size, mask)?;

        let mut payload = Vec::with_capacity(2 + mask.len());
        payload.push(group.index);
        payload.push(op.tag());
        payload.extend_from_slice(mask);

        let response = self.exchange(&Message::new(CommandCode::GroupBinOp, payload))?;
        Self::expect_reply(&response, CommandCode::Ok)
    }

    /// Create a group from the given member variables.
    ///
    /// Requires at least one member; every member must be a live catalog
    /// entry. On acknowledgment the group catalog is refreshed and the newly
    /// appended group is returned. If that follow-up refresh fails, the group
    /// exists on the server but not client-side; retry with
    /// [`Client::refresh_groups`].
    pub fn create_group(&mut self, members: &[Variable]) -> Result<Group> {
        self.guard_initialized()?;
        if members.is_empty() {
            return Err(Error::EmptyGroup);
        }
        for member in members {
            self.require_variable(member)?;
        }

        let payload: Vec<u8> = members.iter().map(|member| member.index).collect();
        let response = self.exchange(&Message::new(CommandCode::GroupCreate, payload))?;
        Self::expect_reply(&response, CommandCode::Ok)?;

        self.update_groups()?;
        let group = self
            .groups
            .entries()
            .last()
            .cloned()
            .ok_or(Error::CreatedGroupMissing)?;
        debug!(group = group.index, members = members.len(), "created group");
        Ok(group)
    }

    /// Remove all removable groups.
    ///
    /// Server-mandatory groups survive, so the refreshed catalog may
    /// legitimately stay non-empty. If the follow-up refresh fails, retry
    /// with [`Client::refresh_groups`].
    pub fn remove_all_groups(&mut self) -> Result<()> {
        self.guard_initialized()?;

        let response = self.exchange(&Message::new(CommandCode::GroupRemoveAll, Bytes::new()))?;
        Self::expect_reply(&response, CommandCode::Ok)?;

        self.update_groups()?;
        debug!(remaining = self.groups.len(), "removed groups");
        Ok(())
    }

    /// Request one curve block. Returns the block's data bytes, up to the
    /// curve's block size.
    pub fn request_curve_block(&mut self, curve: &Curve, offset: u16) -> Result<Bytes> {
        self.guard_initialized()?;
        self.require_curve(curve)?;
        Self::require_offset(curve, offset)?;

        let [hi, lo] = offset.to_be_bytes();
        let response = self.exchange(&Message::new(
            CommandCode::CurveBlockRequest,
            vec![curve.index, hi, lo],
        ))?;
        Self::expect_reply(&response, CommandCode::CurveBlock)?;

        let payload = response.payload();
        if payload.len() < CURVE_BLOCK_INFO {
            return Err(Error::ResponseTooShort {
                needed: CURVE_BLOCK_INFO,
                got: payload.len(),
            });
        }
        Ok(payload.slice(CURVE_BLOCK_INFO..))
    }

    /// Send one curve block. `data` must not exceed the curve's block size.
    pub fn send_curve_block(&mut self, curve: &Curve, offset: u16, data: &[u8]) -> Result<()> {
        self.guard_initialized()?;
        self.require_curve(curve)?;
        if !curve.writable {
            return Err(Error::NotWritable {
                entity: "curve",
                index: curve.index,
            });
        }
        Self::require_offset(curve, offset)?;
        if data.len() > curve.block_size {
            return Err(Error::BlockTooLarge {
                len: data.len(),
                max: curve.block_size,
            });
        }

        let [hi, lo] = offset.to_be_bytes();
        let mut payload = Vec::with_capacity(CURVE_BLOCK_INFO + data.len());
        payload.push(curve.index);
        payload.push(hi);
        payload.push(lo);
        payload.extend_from_slice(data);

        let response = self.exchange(&Message::new(CommandCode::CurveBlock, payload))?;
        Self::expect_reply(&response, CommandCode::Ok)
    }

    /// Ask the server to recompute a curve's checksum.
    ///
    /// On acknowledgment the curve catalog is refreshed so the new checksum
    /// becomes observable. If that follow-up refresh fails, retry with
    /// [`Client::refresh_curves`].
    pub fn recalc_curve_checksum(&mut self, curve: &Curve) -> Result<()> {
        self.guard_initialized()?;
        self.require_curve(curve)?;

        let response =
            self.exchange(&Message::new(CommandCode::CurveRecalcCsum, vec![curve.index]))?;
        Self::expect_reply(&response, CommandCode::Ok)?;

        self.update_curves()
    }

    /// Execute a remote function.
    ///
    /// `input` must be exactly the function's input size (empty for a
    /// function with no input). The reply is either the function's output or
    /// an in-band error code; see [`FunctionOutcome`].
    pub fn execute_function(
        &mut self,
        function: &Function,
        input: &[u8],
    ) -> Result<FunctionOutcome> {
        self.guard_initialized()?;
        self.require_function(function)?;
        Self::require_size(function.input_size, input)?;

        let mut payload = Vec::with_capacity(1 + input.len());
        payload.push(function.index);
        payload.extend_from_slice(input);

        let response = self.exchange(&Message::new(CommandCode::FuncExecute, payload))?;

        if response.is(CommandCode::FuncReturn) {
            let payload = response.payload();
            if payload.len() < function.output_size {
                return Err(Error::ResponseTooShort {
                    needed: function.output_size,
                    got: payload.len(),
                });
            }
            Ok(FunctionOutcome::Completed(
                payload.slice(..function.output_size),
            ))
        } else if response.is(CommandCode::FuncError) {
            let payload = response.payload();
            if payload.is_empty() {
                return Err(Error::ResponseTooShort { needed: 1, got: 0 });
            }
            Ok(FunctionOutcome::Faulted(payload[0]))
        } else {
            Err(Error::UnexpectedReply {
                expected: CommandCode::FuncReturn,
                got: response.code(),
            })
        }
    }

    fn require_variable(&self, variable: &Variable) -> Result<()> {
        if self.variables.contains(variable) {
            Ok(())
        } else {
            Err(Error::StaleHandle { entity: "variable" })
        }
    }

    fn require_writable_variable(&self, variable: &Variable) -> Result<()> {
        self.require_variable(variable)?;
        if variable.writable {
            Ok(())
        } else {
            Err(Error::NotWritable {
                entity: "variable",
                index: variable.index,
            })
        }
    }

    fn require_group(&self, group: &Group) -> Result<()> {
        if self.groups.contains(group) {
            Ok(())
        } else {
            Err(Error::StaleHandle { entity: "group" })
        }
    }

    fn require_writable_group(&self, group: &Group) -> Result<()> {
        self.require_group(group)?;
        if group.writable {
            Ok(())
        } else {
            Err(Error::NotWritable {
                entity: "group",
                index: group.index,
            })
        }
    }

    fn require_curve(&self, curve: &Curve) -> Result<()> {
        if self.curves.contains(curve) {
            Ok(())
        } else {
            Err(Error::StaleHandle { entity: "curve" })
        }
    }

    fn require_function(&self, function: &Function) -> Result<()> {
        if self.functions.contains(function) {
            Ok(())
        } else {
            Err(Error::StaleHandle { entity: "function" })
        }
    }

    fn require_size(expected: usize, supplied: &[u8]) -> Result<()> {
        if supplied.len() == expected {
            Ok(())
        } else {
            Err(Error::SizeMismatch {
                expected,
                got: supplied.len(),
            })
        }
    }

    fn require_offset(curve: &Curve, offset: u16) -> Result<()> {
        if u32::from(offset) > curve.nblocks {
            Err(Error::OffsetOutOfRange {
                offset,
                nblocks: curve.nblocks,
            })
        } else {
            Ok(())
        }
    }
}
