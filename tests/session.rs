//! Session lifecycle and catalog behavior against a scripted transport.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use ecp::{Client, CommandCode, ErrorKind, Transport};

/// One scripted reply: a canned frame, or a receive failure.
enum Reply {
    Frame(Vec<u8>),
    Fail,
}

#[derive(Default)]
struct Wire {
    replies: VecDeque<Reply>,
    sent: Vec<Vec<u8>>,
}

/// Transport stub that replays canned reply frames and records every request.
///
/// Clones share the same wire, so a test can keep a probe handle while the
/// client owns the transport.
#[derive(Clone, Default)]
struct ScriptedTransport {
    wire: Arc<Mutex<Wire>>,
}

impl ScriptedTransport {
    fn new(replies: impl IntoIterator<Item = Vec<u8>>) -> Self {
        let transport = Self::default();
        for frame in replies {
            transport.push_reply(frame);
        }
        transport
    }

    fn push_reply(&self, frame: Vec<u8>) {
        self.wire.lock().unwrap().replies.push_back(Reply::Frame(frame));
    }

    fn push_failure(&self) {
        self.wire.lock().unwrap().replies.push_back(Reply::Fail);
    }

    fn sent(&self) -> Vec<Vec<u8>> {
        self.wire.lock().unwrap().sent.clone()
    }

    fn sent_count(&self) -> usize {
        self.wire.lock().unwrap().sent.len()
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        self.wire.lock().unwrap().sent.push(frame.to_vec());
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.wire.lock().unwrap().replies.pop_front() {
            Some(Reply::Frame(frame)) => {
                buf[..frame.len()].copy_from_slice(&frame);
                Ok(frame.len())
            }
            Some(Reply::Fail) => Err(io::Error::new(io::ErrorKind::TimedOut, "device silent")),
            None => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted")),
        }
    }
}

fn frame(code: CommandCode, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![code.as_u8()];
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Replies for an init that reports no entities at all.
fn empty_init_replies() -> Vec<Vec<u8>> {
    vec![
        frame(CommandCode::Version, &[2, 0, 0]),
        frame(CommandCode::VarList, &[]),
        frame(CommandCode::GroupList, &[]),
        frame(CommandCode::CurveList, &[]),
        frame(CommandCode::FuncList, &[]),
    ]
}

#[test]
fn init_with_empty_catalogs() {
    let transport = ScriptedTransport::new(empty_init_replies());
    let mut client = Client::new(transport.clone());

    client.init().unwrap();

    assert!(client.is_initialized());
    assert_eq!(client.version().to_string(), "2.00.000");
    assert!(client.variables().is_empty());
    assert!(client.groups().is_empty());
    assert!(client.curves().is_empty());
    assert!(client.functions().is_empty());
    // version + 4 list queries, nothing else
    assert_eq!(transport.sent_count(), 5);
}

#[test]
fn version_fallback_for_legacy_server() {
    let mut replies = empty_init_replies();
    replies[0] = frame(CommandCode::OpNotSupported, &[]);
    let mut client = Client::new(ScriptedTransport::new(replies));

    client.init().unwrap();

    let version = client.version();
    assert_eq!((version.major, version.minor, version.revision), (1, 0, 0));
    assert_eq!(version.to_string(), "1.00.000");
}

#[test]
fn variable_catalog_decodes_packed_bytes() {
    let mut replies = empty_init_replies();
    // 0x84: writable, size 4. 0x01: read-only, size 1.
    replies[1] = frame(CommandCode::VarList, &[0x84, 0x01]);
    let mut client = Client::new(ScriptedTransport::new(replies));

    client.init().unwrap();

    let vars = client.variables();
    assert_eq!(vars.len(), 2);
    assert_eq!(vars[0].id(), 0);
    assert!(vars[0].writable());
    assert_eq!(vars[0].size(), 4);
    assert_eq!(vars[1].id(), 1);
    assert!(!vars[1].writable());
    assert_eq!(vars[1].size(), 1);
}

#[test]
fn variable_size_sentinel_expands_to_max() {
    let mut replies = empty_init_replies();
    // Size field 0 means the maximum size; a catalog never holds a
    // zero-sized variable.
    replies[1] = frame(CommandCode::VarList, &[0x80, 0x00]);
    let mut client = Client::new(ScriptedTransport::new(replies));

    client.init().unwrap();

    for var in client.variables() {
        assert_eq!(var.size(), 128);
    }
}

#[test]
fn group_catalog_resolves_members_and_sums_sizes() {
    let mut replies = empty_init_replies();
    replies[1] = frame(CommandCode::VarList, &[0x84, 0x01]);
    // One writable group with two declared members...
    replies[2] = frame(CommandCode::GroupList, &[0x82]);
    // ...whose membership query answers variable ids 0 and 1.
    replies.insert(3, frame(CommandCode::Group, &[0, 1]));
    let mut client = Client::new(ScriptedTransport::new(replies));

    client.init().unwrap();

    let groups = client.groups();
    assert_eq!(groups.len(), 1);
    let group = &groups[0];
    assert_eq!(group.id(), 0);
    assert!(group.writable());
    assert_eq!(group.size(), 4 + 1);
    assert_eq!(group.members().len(), 2);
    assert_eq!(group.members()[0].id(), 0);
    assert_eq!(group.members()[1].id(), 1);
}

#[test]
fn group_refresh_failure_resets_catalog() {
    let mut replies = empty_init_replies();
    replies[1] = frame(CommandCode::VarList, &[0x84, 0x01]);
    replies[2] = frame(CommandCode::GroupList, &[0x82]);
    // Membership query answered with the wrong code: refresh must abort.
    replies.insert(3, frame(CommandCode::Ok, &[]));
    let mut client = Client::new(ScriptedTransport::new(replies));

    let err = client.init().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Communication);
    assert!(!client.is_initialized());
    assert!(client.groups().is_empty());
}

#[test]
fn group_reply_with_unknown_variable_id_aborts_refresh() {
    let mut replies = empty_init_replies();
    replies[1] = frame(CommandCode::VarList, &[0x84]);
    replies[2] = frame(CommandCode::GroupList, &[0x81]);
    // Variable id 9 does not exist in a one-variable catalog.
    replies.insert(3, frame(CommandCode::Group, &[9]));
    let mut client = Client::new(ScriptedTransport::new(replies));

    let err = client.init().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Communication);
    assert!(client.groups().is_empty());
}

#[test]
fn curve_catalog_decodes_records_and_checksums() {
    let mut replies = empty_init_replies();
    // writable, block_size 16, nblocks 2; then read-only, block_size 8, nblocks 1
    replies[3] = frame(
        CommandCode::CurveList,
        &[1, 0, 16, 0, 2, 0, 0, 8, 0, 1],
    );
    replies.insert(4, frame(CommandCode::CurveCsum, &[0xAB; 16]));
    // Second checksum query fails at the transport; that curve's checksum
    // stays unset, the refresh still succeeds.
    let transport = ScriptedTransport::new(replies);
    let mut client = Client::new(transport.clone());
    // Order of replies: version, varlist, grouplist, curvelist, csum0, FAIL, funclist
    // Rebuild the tail: drop funclist, push failure, re-push funclist.
    {
        let mut wire = transport.wire.lock().unwrap();
        let funclist = wire.replies.pop_back().unwrap();
        wire.replies.push_back(Reply::Fail);
        wire.replies.push_back(funclist);
    }

    client.init().unwrap();

    let curves = client.curves();
    assert_eq!(curves.len(), 2);
    assert!(curves[0].writable());
    assert_eq!(curves[0].block_size(), 16);
    assert_eq!(curves[0].nblocks(), 2);
    assert_eq!(curves[0].checksum(), Some([0xAB; 16]));
    assert!(!curves[1].writable());
    assert_eq!(curves[1].checksum(), None);
}

#[test]
fn curve_nblocks_sentinel_expands_to_max() {
    let mut replies = empty_init_replies();
    replies[3] = frame(CommandCode::CurveList, &[0, 0, 16, 0, 0]);
    replies.insert(4, frame(CommandCode::CurveCsum, &[0; 16]));
    let mut client = Client::new(ScriptedTransport::new(replies));

    client.init().unwrap();

    assert_eq!(client.curves()[0].nblocks(), 65_536);
}

#[test]
fn function_catalog_decodes_nibbles() {
    let mut replies = empty_init_replies();
    replies[4] = frame(CommandCode::FuncList, &[0x23, 0x00]);
    let mut client = Client::new(ScriptedTransport::new(replies));

    client.init().unwrap();

    let funcs = client.functions();
    assert_eq!(funcs.len(), 2);
    assert_eq!(funcs[0].input_size(), 2);
    assert_eq!(funcs[0].output_size(), 3);
    assert_eq!(funcs[1].input_size(), 0);
    assert_eq!(funcs[1].output_size(), 0);
}

#[test]
fn init_aborts_on_first_failure() {
    let transport = ScriptedTransport::default();
    transport.push_failure();
    let mut client = Client::new(transport.clone());

    let err = client.init().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Communication);
    assert!(!client.is_initialized());
    // Only the version request went out; the catalog queries never followed.
    assert_eq!(transport.sent_count(), 1);
}

#[test]
fn operations_require_initialization() {
    let transport = ScriptedTransport::default();
    transport.push_failure();
    let mut client = Client::new(transport.clone());
    client.init().unwrap_err();

    // A variable handle cannot exist yet, but the refresh entry points can
    // be reached; they must refuse without another round trip.
    let err = client.refresh_groups().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = client.refresh_curves().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(transport.sent_count(), 1);
}

#[test]
fn mismatched_list_reply_code_fails_init() {
    let mut replies = empty_init_replies();
    replies[1] = frame(CommandCode::GroupList, &[]);
    let mut client = Client::new(ScriptedTransport::new(replies));

    let err = client.init().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Communication);
    assert!(!client.is_initialized());
}

#[test]
fn truncated_response_is_a_communication_error() {
    let transport = ScriptedTransport::new(empty_init_replies());
    let mut client = Client::new(transport.clone());
    {
        let mut wire = transport.wire.lock().unwrap();
        // Variable list reply declares 4 payload bytes but carries 1.
        wire.replies[1] = Reply::Frame(vec![CommandCode::VarList.as_u8(), 0x00, 0x04, 0x84]);
    }

    let err = client.init().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Communication);
}

#[test]
fn create_group_then_read_it_back() {
    let mut replies = empty_init_replies();
    replies[1] = frame(CommandCode::VarList, &[0x84, 0x01]);
    // One server-mandatory group exists before ours.
    replies[2] = frame(CommandCode::GroupList, &[0x02]);
    replies.insert(3, frame(CommandCode::Group, &[0, 1]));
    let transport = ScriptedTransport::new(replies);
    let mut client = Client::new(transport.clone());
    client.init().unwrap();

    // create ack, then the post-create group refresh: two groups now.
    transport.push_reply(frame(CommandCode::Ok, &[]));
    transport.push_reply(frame(CommandCode::GroupList, &[0x02, 0x82]));
    transport.push_reply(frame(CommandCode::Group, &[0, 1]));
    transport.push_reply(frame(CommandCode::Group, &[0, 1]));

    let vars = [client.variables()[0], client.variables()[1]];
    let group = client.create_group(&vars).unwrap();

    assert_eq!(group.id(), 1);
    assert_eq!(&group, client.groups().last().unwrap());
    assert_eq!(group.size(), 4 + 1);

    // The create request carried exactly the member ids.
    let sent = transport.sent();
    let create_request = sent
        .iter()
        .find(|f| f[0] == CommandCode::GroupCreate.as_u8())
        .unwrap();
    assert_eq!(&create_request[3..], &[0, 1]);

    transport.push_reply(frame(CommandCode::GroupValues, &[9, 9, 9, 9, 7]));
    let values = client.read_group(&group).unwrap();

    assert_eq!(values.len(), group.size());
    // The read addressed the newly appended group.
    let read_request = transport.sent().pop().unwrap();
    assert_eq!(read_request[0], CommandCode::GroupRead.as_u8());
    assert_eq!(&read_request[3..], &[1]);
}

#[test]
fn reinit_invalidates_old_handles() {
    let mut replies = empty_init_replies();
    replies[1] = frame(CommandCode::VarList, &[0x84]);
    let transport = ScriptedTransport::new(replies);
    let mut client = Client::new(transport.clone());
    client.init().unwrap();

    let old_var = client.variables()[0];

    let mut replies = empty_init_replies();
    replies[1] = frame(CommandCode::VarList, &[0x84]);
    for reply in replies {
        transport.push_reply(reply);
    }
    client.init().unwrap();

    let before = transport.sent_count();
    let err = client.read_variable(&old_var).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    // The stale handle was rejected locally.
    assert_eq!(transport.sent_count(), before);

    // The same catalog position is live again under the new generation.
    transport.push_reply(frame(CommandCode::VarValue, &[1, 2, 3, 4]));
    let fresh = client.variables()[0];
    assert_eq!(client.read_variable(&fresh).unwrap().as_ref(), &[1, 2, 3, 4]);
}

#[test]
fn stale_member_handles_fail_group_creation() {
    let mut replies = empty_init_replies();
    replies[1] = frame(CommandCode::VarList, &[0x84]);
    let transport = ScriptedTransport::new(replies);
    let mut client = Client::new(transport.clone());
    client.init().unwrap();

    let old_var = client.variables()[0];

    let mut replies = empty_init_replies();
    replies[1] = frame(CommandCode::VarList, &[0x84]);
    for reply in replies {
        transport.push_reply(reply);
    }
    client.init().unwrap();

    let before = transport.sent_count();
    let err = client.create_group(&[old_var]).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(transport.sent_count(), before);
}
