//! Minimal ABI encoding for the read calls this worker issues
//!
//! Only three call shapes exist: `ownerOf(uint256)`, `balanceOf(address)`
//! and Multicall3 `aggregate3((address,bool,bytes)[])`. Addresses are
//! 0x-prefixed 20-byte hex; token ids are 0x-prefixed hex up to 32 bytes.

use crate::infrastructure::ethereum::error::EthereumClientError;

/// ownerOf(uint256)
pub const OWNER_OF_SELECTOR: [u8; 4] = [0x63, 0x52, 0x21, 0x1e];
/// balanceOf(address)
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
/// aggregate3((address,bool,bytes)[])
pub const AGGREGATE3_SELECTOR: [u8; 4] = [0x82, 0xad, 0x56, 0xcb];

/// One sub-call inside an aggregate3 request
#[derive(Debug, Clone)]
pub struct Call3 {
    pub target: String,
    pub allow_failure: bool,
    pub call_data: Vec<u8>,
}

/// One sub-call result decoded from an aggregate3 response
#[derive(Debug, Clone)]
pub struct Call3Result {
    pub success: bool,
    pub return_data: Vec<u8>,
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

/// Decode a 0x-prefixed hex string into bytes
pub fn decode_hex(s: &str) -> Result<Vec<u8>, EthereumClientError> {
    hex::decode(strip_0x(s)).map_err(|e| {
        EthereumClientError::ParseError(format!("Invalid hex '{}': {}", s, e))
    })
}

/// Encode bytes as a 0x-prefixed hex string
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Left-pad an address into a 32-byte ABI word
fn address_word(address: &str) -> Result<[u8; 32], EthereumClientError> {
    let bytes = decode_hex(address)?;
    if bytes.len() != 20 {
        return Err(EthereumClientError::ParseError(format!(
            "Address '{}' is not 20 bytes",
            address
        )));
    }
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&bytes);
    Ok(word)
}

/// Left-pad a hex token id into a 32-byte ABI word
fn uint_word(token_id: &str) -> Result<[u8; 32], EthereumClientError> {
    let stripped = strip_0x(token_id);
    // hex::decode needs an even number of digits
    let padded;
    let digits = if stripped.len() % 2 == 1 {
        padded = format!("0{}", stripped);
        padded.as_str()
    } else {
        stripped
    };
    let bytes = hex::decode(digits).map_err(|e| {
        EthereumClientError::ParseError(format!("Invalid token id '{}': {}", token_id, e))
    })?;
    if bytes.len() > 32 {
        return Err(EthereumClientError::ParseError(format!(
            "Token id '{}' exceeds 32 bytes",
            token_id
        )));
    }
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}

fn u64_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Calldata for ownerOf(tokenId)
pub fn encode_owner_of(token_id: &str) -> Result<Vec<u8>, EthereumClientError> {
    let mut data = OWNER_OF_SELECTOR.to_vec();
    data.extend_from_slice(&uint_word(token_id)?);
    Ok(data)
}

/// Calldata for balanceOf(holder)
pub fn encode_balance_of(holder: &str) -> Result<Vec<u8>, EthereumClientError> {
    let mut data = BALANCE_OF_SELECTOR.to_vec();
    data.extend_from_slice(&address_word(holder)?);
    Ok(data)
}

/// Calldata for aggregate3(calls)
pub fn encode_aggregate3(calls: &[Call3]) -> Result<Vec<u8>, EthereumClientError> {
    let mut data = AGGREGATE3_SELECTOR.to_vec();
    // Offset to the dynamic array argument
    data.extend_from_slice(&u64_word(0x20));
    data.extend_from_slice(&u64_word(calls.len() as u64));

    // Each Call3 tuple contains bytes, so the array stores offsets first
    let mut tails: Vec<Vec<u8>> = Vec::with_capacity(calls.len());
    for call in calls {
        let mut tuple = Vec::new();
        tuple.extend_from_slice(&address_word(&call.target)?);
        tuple.extend_from_slice(&u64_word(if call.allow_failure { 1 } else { 0 }));
        // Offset to the bytes field, relative to the tuple start
        tuple.extend_from_slice(&u64_word(0x60));
        tuple.extend_from_slice(&u64_word(call.call_data.len() as u64));
        tuple.extend_from_slice(&call.call_data);
        let pad = (32 - call.call_data.len() % 32) % 32;
        tuple.extend(std::iter::repeat(0u8).take(pad));
        tails.push(tuple);
    }

    let mut offset = 32 * calls.len();
    for tuple in &tails {
        data.extend_from_slice(&u64_word(offset as u64));
        offset += tuple.len();
    }
    for tuple in tails {
        data.extend_from_slice(&tuple);
    }

    Ok(data)
}

fn read_word(data: &[u8], at: usize) -> Result<&[u8], EthereumClientError> {
    data.get(at..at + 32).ok_or_else(|| {
        EthereumClientError::ParseError(format!("Return data truncated at offset {}", at))
    })
}

fn read_usize(data: &[u8], at: usize) -> Result<usize, EthereumClientError> {
    let word = read_word(data, at)?;
    if word[..24].iter().any(|b| *b != 0) {
        return Err(EthereumClientError::ParseError(
            "Unreasonably large ABI offset".to_string(),
        ));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(buf) as usize)
}

/// Decode the Result[] returned by aggregate3
pub fn decode_aggregate3(data: &[u8]) -> Result<Vec<Call3Result>, EthereumClientError> {
    let array_at = read_usize(data, 0)?;
    let len = read_usize(data, array_at)?;
    let elements_at = array_at + 32;

    let mut results = Vec::with_capacity(len);
    for i in 0..len {
        let tuple_at = elements_at + read_usize(data, elements_at + 32 * i)?;
        let success = read_word(data, tuple_at)?[31] == 1;
        let bytes_at = tuple_at + read_usize(data, tuple_at + 32)?;
        let bytes_len = read_usize(data, bytes_at)?;
        let start = bytes_at + 32;
        let return_data = data
            .get(start..start + bytes_len)
            .ok_or_else(|| {
                EthereumClientError::ParseError("Return data truncated in bytes field".to_string())
            })?
            .to_vec();
        results.push(Call3Result {
            success,
            return_data,
        });
    }

    Ok(results)
}

/// Decode a 32-byte ABI word holding an address
pub fn decode_address(data: &[u8]) -> Result<String, EthereumClientError> {
    if data.len() < 32 {
        return Err(EthereumClientError::ParseError(
            "Address return data shorter than one word".to_string(),
        ));
    }
    Ok(encode_hex(&data[12..32]))
}

/// Decode a 32-byte ABI word holding a uint256 balance
///
/// Balances beyond u128 are clamped: anything that large exceeds every
/// realistic offer amount.
pub fn decode_uint_as_u128(data: &[u8]) -> Result<u128, EthereumClientError> {
    if data.len() < 32 {
        return Err(EthereumClientError::ParseError(
            "Uint return data shorter than one word".to_string(),
        ));
    }
    if data[..16].iter().any(|b| *b != 0) {
        return Ok(u128::MAX);
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&data[16..32]);
    Ok(u128::from_be_bytes(buf))
}

/// Parse a JSON-RPC quantity (0x-hex) into a u128, clamping on overflow
pub fn parse_quantity(value: &str) -> Result<u128, EthereumClientError> {
    let stripped = strip_0x(value);
    if stripped.is_empty() {
        return Err(EthereumClientError::ParseError(
            "Empty quantity".to_string(),
        ));
    }
    if stripped.len() > 32 {
        return Ok(u128::MAX);
    }
    u128::from_str_radix(stripped, 16).map_err(|e| {
        EthereumClientError::ParseError(format!("Invalid quantity '{}': {}", value, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_owner_of() {
        let data = encode_owner_of("0x2a").unwrap();
        assert_eq!(&data[..4], &OWNER_OF_SELECTOR);
        assert_eq!(data.len(), 36);
        assert_eq!(data[35], 0x2a);
    }

    #[test]
    fn test_encode_balance_of_pads_address() {
        let data = encode_balance_of("0x1111111111111111111111111111111111111111").unwrap();
        assert_eq!(&data[..4], &BALANCE_OF_SELECTOR);
        assert_eq!(data.len(), 36);
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(data[16], 0x11);
    }

    #[test]
    fn test_encode_balance_of_rejects_short_address() {
        assert!(encode_balance_of("0x1234").is_err());
    }

    #[test]
    fn test_aggregate3_round_trip_layout() {
        let calls = vec![
            Call3 {
                target: "0x2222222222222222222222222222222222222222".to_string(),
                allow_failure: true,
                call_data: encode_balance_of("0x1111111111111111111111111111111111111111")
                    .unwrap(),
            },
            Call3 {
                target: "0x2222222222222222222222222222222222222222".to_string(),
                allow_failure: true,
                call_data: encode_balance_of("0x3333333333333333333333333333333333333333")
                    .unwrap(),
            },
        ];
        let data = encode_aggregate3(&calls).unwrap();
        assert_eq!(&data[..4], &AGGREGATE3_SELECTOR);
        // Array offset then length
        assert_eq!(read_usize(&data[4..], 0).unwrap(), 0x20);
        assert_eq!(read_usize(&data[4..], 0x20).unwrap(), 2);
    }

    #[test]
    fn test_decode_aggregate3_partial_failure() {
        // Hand-built response: [(true, 0x01), (false, empty)]
        let mut data = Vec::new();
        data.extend_from_slice(&u64_word(0x20)); // offset to array
        data.extend_from_slice(&u64_word(2)); // length
        data.extend_from_slice(&u64_word(0x40)); // offset elem 0
        data.extend_from_slice(&u64_word(0x40 + 0x80)); // offset elem 1
        // elem 0: success=true, bytes offset, len 32, value 1
        data.extend_from_slice(&u64_word(1));
        data.extend_from_slice(&u64_word(0x40));
        data.extend_from_slice(&u64_word(32));
        data.extend_from_slice(&u64_word(1));
        // elem 1: success=false, bytes offset, len 0
        data.extend_from_slice(&u64_word(0));
        data.extend_from_slice(&u64_word(0x40));
        data.extend_from_slice(&u64_word(0));

        let results = decode_aggregate3(&data).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert_eq!(decode_uint_as_u128(&results[0].return_data).unwrap(), 1);
        assert!(!results[1].success);
        assert!(results[1].return_data.is_empty());
    }

    #[test]
    fn test_decode_address() {
        let mut word = vec![0u8; 32];
        word[12..].copy_from_slice(&[0xaa; 20]);
        assert_eq!(
            decode_address(&word).unwrap(),
            "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        );
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0xde0b6b3a7640000").unwrap(), 1_000_000_000_000_000_000);
        assert!(parse_quantity("0x").is_err());
    }

    #[test]
    fn test_parse_quantity_clamps_overflow() {
        let huge = format!("0x{}", "f".repeat(40));
        assert_eq!(parse_quantity(&huge).unwrap(), u128::MAX);
    }
}
