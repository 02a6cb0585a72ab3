//! Block source backed by a JSON-lines log file.
//!
//! Each non-blank line is one [`RawLog`] in the JSON-RPC shape. Consecutive
//! logs with the same block number form one [`Block`]; block numbers must
//! never decrease.

use std::path::Path;

use tracing::debug;

use crate::decoder::RawLog;
use crate::events::Block;

/// Block source errors.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// File could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line is not a valid raw log.
    #[error("invalid log at line {line}: {source}")]
    Json {
        /// 1-based line number.
        line: usize,
        /// Parser error.
        source: serde_json::Error,
    },

    /// Logs are not ordered by block.
    #[error("log for block {found} follows block {previous}")]
    OutOfOrder {
        /// Block of the preceding log.
        previous: u64,
        /// Block of the offending log.
        found: u64,
    },
}

/// Reads and groups all logs of a JSON-lines file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a line is malformed, or the
/// logs are out of block order.
pub async fn read_blocks(path: impl AsRef<Path>) -> Result<Vec<Block>, SourceError> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path).await?;
    let blocks = parse_blocks(&contents)?;
    debug!(path = %path.display(), blocks = blocks.len(), "read log file");
    Ok(blocks)
}

/// Parses JSON-lines text into ordered blocks.
///
/// # Errors
///
/// Returns an error if a line is malformed or the logs are out of block
/// order.
pub fn parse_blocks(contents: &str) -> Result<Vec<Block>, SourceError> {
    let mut blocks: Vec<Block> = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let log: RawLog = serde_json::from_str(line)
            .map_err(|source| SourceError::Json { line: idx + 1, source })?;

        match blocks.last_mut() {
            Some(block) if block.number == log.block_number => block.logs.push(log),
            Some(block) if block.number > log.block_number => {
                return Err(SourceError::OutOfOrder {
                    previous: block.number,
                    found: log.block_number,
                });
            }
            _ => blocks.push(Block::new(log.block_number, vec![log])),
        }
    }

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn line(block: u64, index: u32) -> String {
        format!(
            r#"{{"address":"0x01","topics":["0x02"],"data":"0x","blockNumber":{block},"logIndex":{index}}}"#
        )
    }

    #[test]
    fn test_parse_groups_by_block() {
        let text = [line(1, 0), line(1, 1), line(3, 0)].join("\n");
        let blocks = parse_blocks(&text).expect("blocks");

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].number, 1);
        assert_eq!(blocks[0].logs.len(), 2);
        assert_eq!(blocks[1].number, 3);
        assert_eq!(blocks[1].logs[0].log_index, 0);
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let text = format!("\n{}\n   \n{}\n", line(2, 0), line(2, 1));
        let blocks = parse_blocks(&text).expect("blocks");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].logs.len(), 2);
    }

    #[test]
    fn test_parse_transaction_hash() {
        let text = r#"{"address":"0x01","topics":[],"data":"0x","blockNumber":7,"logIndex":2,"transactionHash":"0xabc"}"#;
        let blocks = parse_blocks(text).expect("blocks");
        assert_eq!(blocks[0].logs[0].transaction_hash.as_deref(), Some("0xabc"));
    }

    #[test]
    fn test_parse_rejects_out_of_order() {
        let text = [line(5, 0), line(4, 0)].join("\n");
        assert!(matches!(
            parse_blocks(&text),
            Err(SourceError::OutOfOrder {
                previous: 5,
                found: 4
            })
        ));
    }

    #[test]
    fn test_parse_reports_bad_line() {
        let text = format!("{}\nnot json", line(1, 0));
        assert!(matches!(
            parse_blocks(&text),
            Err(SourceError::Json { line: 2, .. })
        ));
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_blocks("").expect("blocks").is_empty());
    }

    #[tokio::test]
    async fn test_read_blocks_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "{}", line(10, 0)).expect("write");
        writeln!(file, "{}", line(11, 0)).expect("write");

        let blocks = read_blocks(file.path()).await.expect("blocks");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].number, 11);
    }

    #[tokio::test]
    async fn test_read_blocks_missing_file() {
        let result = read_blocks("/nonexistent/rsvp/logs.jsonl").await;
        assert!(matches!(result, Err(SourceError::Io(_))));
    }
}
