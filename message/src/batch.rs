use crate::{
    CommandMessage,
    Error,
    RS_DECODED_SIZE,
};

pub const BLOCK_SIZE: usize = RS_DECODED_SIZE;

/// Command bytes a block may hold; the final byte stays zero as the batch terminator.
pub const BLOCK_CAPACITY: usize = BLOCK_SIZE - 1;

pub type Block = [u8; BLOCK_SIZE];

/// Pack commands in order into zero-padded blocks sized for one FEC codeword each.
///
/// A record is never split across blocks. If any command fails to encode the whole call fails,
/// naming the offending index.
#[tracing::instrument(level = "debug", skip_all, fields(commands = commands.len()))]
pub fn pack_commands(commands: &[CommandMessage]) -> Result<Vec<Block>, Error> {
    let mut blocks = vec![];
    let mut current: Block = [0; BLOCK_SIZE];
    let mut fill = 0;

    for (index, cmd) in commands.iter().enumerate() {
        let packed = cmd.pack().map_err(|e| Error::Batch {
            index,
            source: Box::new(e),
        })?;

        if fill + packed.len() > BLOCK_CAPACITY {
            tracing::trace!(fill, "block full");

            blocks.push(current);
            current = [0; BLOCK_SIZE];
            fill = 0;
        }

        current[fill..fill + packed.len()].copy_from_slice(&packed);
        fill += packed.len();
    }

    if fill > 0 {
        blocks.push(current);
    }

    tracing::debug!(blocks = blocks.len(), "packed command batch");
    Ok(blocks)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        command::unpack_commands,
        CommandId,
        CommandPayload,
    };

    fn batch(pings: usize, tail: &[CommandMessage]) -> Vec<CommandMessage> {
        std::iter::repeat(CommandMessage::ping()).take(pings).chain(tail.iter().copied()).collect()
    }

    fn total_len(cmds: &[CommandMessage]) -> usize {
        cmds.iter().map(|c| c.packed_len()).sum()
    }

    fn assert_unsplit(cmds: &[CommandMessage], blocks: &[Block]) -> eyre::Result<()> {
        let mut decoded = vec![];
        for block in blocks {
            assert_eq!(block[BLOCK_CAPACITY], 0);
            decoded.extend(unpack_commands(block)?);
        }

        assert_eq!(decoded, cmds);
        Ok(())
    }

    #[test]
    fn one_short_of_capacity() -> eyre::Result<()> {
        let cmds = batch(43, &[CommandMessage::downlink_logs_next_pass(1)]);
        assert_eq!(total_len(&cmds), 221);

        let blocks = pack_commands(&cmds)?;
        assert_eq!(blocks.len(), 1);
        assert_eq!(&blocks[0][221..], &[0, 0]);

        assert_unsplit(&cmds, &blocks)
    }

    #[test]
    fn exactly_capacity() -> eyre::Result<()> {
        let cmds = batch(42, &[CommandMessage::downlink_logs_next_pass(1), CommandMessage::downlink_logs_next_pass(2)]);
        assert_eq!(total_len(&cmds), BLOCK_CAPACITY);

        let blocks = pack_commands(&cmds)?;
        assert_eq!(blocks.len(), 1);
        assert_ne!(blocks[0][BLOCK_CAPACITY - 1], 0);

        assert_unsplit(&cmds, &blocks)
    }

    #[test]
    fn one_over_capacity() -> eyre::Result<()> {
        let cmds = batch(41, &[CommandMessage::rtc_sync(1), CommandMessage::rtc_sync(2)]);
        assert_eq!(total_len(&cmds), BLOCK_SIZE);

        let blocks = pack_commands(&cmds)?;
        assert_eq!(blocks.len(), 2);
        assert_eq!(unpack_commands(&blocks[1])?, vec![CommandMessage::rtc_sync(2)]);

        assert_unsplit(&cmds, &blocks)
    }

    #[test]
    fn empty() -> eyre::Result<()> {
        assert!(pack_commands(&[])?.is_empty());
        Ok(())
    }

    #[test]
    fn names_failing_index() {
        let bad = serde_json::from_str::<CommandMessage>(
            r#"{"id":"RtcSync","timestamp":0,"time_tagged":false,"payload":"None"}"#,
        )
        .unwrap();

        let err = pack_commands(&[CommandMessage::ping(), bad]).unwrap_err();
        assert_eq!(err, Error::Batch {
            index:  1,
            source: Box::new(Error::PayloadMismatch(CommandId::RtcSync)),
        });

        assert_eq!(*bad.payload(), CommandPayload::None);
    }

    #[test]
    fn terminator_mid_batch() {
        let eof = serde_json::from_str::<CommandMessage>(
            r#"{"id":"EndOfFrame","timestamp":0,"time_tagged":false,"payload":"None"}"#,
        )
        .unwrap();

        let err = pack_commands(&[CommandMessage::ping(), eof, CommandMessage::rtc_sync(7)]).unwrap_err();
        assert_eq!(err, Error::Batch {
            index:  1,
            source: Box::new(Error::UnsupportedCommand(0)),
        });
    }
}
