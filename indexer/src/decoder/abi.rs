//! Minimal reader for ABI-encoded log data.
//!
//! Only the shapes the RSVP contract emits are supported: static
//! `bytes32`, `address` and `uint256` head words and a dynamic `string`.

use super::DecodeError;

/// Size of one ABI word.
pub const WORD: usize = 32;

/// Reads head words out of ABI-encoded data.
#[derive(Debug, Clone, Copy)]
pub struct AbiReader<'a> {
    data: &'a [u8],
}

impl<'a> AbiReader<'a> {
    /// Wraps raw data bytes.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Returns the 32-byte word at `offset` bytes.
    fn word_at(&self, offset: usize) -> Result<&'a [u8], DecodeError> {
        let end = offset.checked_add(WORD).ok_or(DecodeError::InvalidOffset {
            word: offset / WORD,
        })?;
        self.data
            .get(offset..end)
            .ok_or(DecodeError::DataTooShort {
                needed: end,
                actual: self.data.len(),
            })
    }

    /// Returns head word `index`.
    pub fn word(&self, index: usize) -> Result<&'a [u8], DecodeError> {
        self.word_at(index.saturating_mul(WORD))
    }

    /// Reads head word `index` as `bytes32`.
    pub fn bytes32(&self, index: usize) -> Result<[u8; 32], DecodeError> {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.word(index)?);
        Ok(out)
    }

    /// Reads head word `index` as a left-padded 20-byte address.
    pub fn address(&self, index: usize) -> Result<[u8; 20], DecodeError> {
        let word = self.word(index)?;
        let (padding, body) = word.split_at(WORD - 20);
        if padding.iter().any(|b| *b != 0) {
            return Err(DecodeError::InvalidAddressPadding { word: index });
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(body);
        Ok(out)
    }

    /// Reads head word `index` as a `uint256` that must fit in 128 bits.
    pub fn uint128(&self, index: usize) -> Result<u128, DecodeError> {
        let word = self.word(index)?;
        let (high, low) = word.split_at(WORD - 16);
        if high.iter().any(|b| *b != 0) {
            return Err(DecodeError::IntegerOverflow { word: index });
        }
        let mut buf = [0u8; 16];
        buf.copy_from_slice(low);
        Ok(u128::from_be_bytes(buf))
    }

    /// Reads head word `index` as an offset into the data and returns it as `usize`.
    fn offset(&self, index: usize) -> Result<usize, DecodeError> {
        let value = self.uint128(index).map_err(|_| DecodeError::InvalidOffset { word: index })?;
        usize::try_from(value).map_err(|_| DecodeError::InvalidOffset { word: index })
    }

    /// Reads the dynamic `string` referenced by head word `index`.
    pub fn string(&self, index: usize) -> Result<String, DecodeError> {
        let start = self.offset(index)?;
        let len_word = self.word_at(start)?;
        let (high, low) = len_word.split_at(WORD - 8);
        if high.iter().any(|b| *b != 0) {
            return Err(DecodeError::InvalidOffset { word: index });
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(low);
        let len = usize::try_from(u64::from_be_bytes(buf))
            .map_err(|_| DecodeError::InvalidOffset { word: index })?;

        let body_start = start + WORD;
        let body_end = body_start
            .checked_add(len)
            .ok_or(DecodeError::InvalidOffset { word: index })?;
        let body = self
            .data
            .get(body_start..body_end)
            .ok_or(DecodeError::DataTooShort {
                needed: body_end,
                actual: self.data.len(),
            })?;

        String::from_utf8(body.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { word: index })
    }
}

#[cfg(test)]
pub(crate) mod encode {
    //! Test-side ABI encoding helpers.

    use super::WORD;

    pub fn word_u128(value: u128) -> Vec<u8> {
        let mut w = vec![0u8; 16];
        w.extend_from_slice(&value.to_be_bytes());
        w
    }

    pub fn word_address(addr: &[u8; 20]) -> Vec<u8> {
        let mut w = vec![0u8; 12];
        w.extend_from_slice(addr);
        w
    }

    /// Encodes `head` words followed by one dynamic string tail.
    pub fn with_string_tail(mut head: Vec<Vec<u8>>, s: &str) -> Vec<u8> {
        let offset = (head.len() + 1) * WORD;
        head.push(word_u128(offset as u128));
        let mut out: Vec<u8> = head.concat();
        out.extend(word_u128(s.len() as u128));
        let mut body = s.as_bytes().to_vec();
        let padded = s.len().div_ceil(WORD) * WORD;
        body.resize(padded, 0);
        out.extend(body);
        out
    }
}
