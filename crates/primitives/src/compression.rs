use std::io::{self, Read, Write};

use alloy_primitives::Bytes;
use alloy_rlp::Decodable;
use flate2::{Compression, read::ZlibDecoder, write::ZlibEncoder};

use crate::pool::TxList;

/// Errors that can occur while decoding a compressed transaction list payload.
#[derive(Debug, thiserror::Error)]
pub enum PayloadDecodeError {
    /// The payload is not valid zlib.
    #[error("decompression failed: {0}")]
    Io(#[from] io::Error),
    /// The decompressed payload is not a valid RLP list of transaction lists.
    #[error("rlp decoding failed: {0}")]
    Rlp(#[from] alloy_rlp::Error),
}

/// Compress the input bytes using `zlib`.
pub fn zlib_compress(input: &[u8]) -> io::Result<Bytes> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input)?;
    encoder.finish().map(Bytes::from)
}

/// Decompress the input bytes using `zlib`.
pub fn zlib_decompress(input: &[u8]) -> io::Result<Bytes> {
    let mut decoder = ZlibDecoder::new(input);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(Bytes::from(decompressed))
}

/// RLP-encode and compress with zlib a given encodable object.
pub fn rlp_encode_and_compress<E: alloy_rlp::Encodable>(b: &E) -> io::Result<Bytes> {
    zlib_compress(&alloy_rlp::encode(b))
}

/// Serialize a batch of transaction lists into the proposal payload: the RLP list of lists,
/// compressed with zlib. Every DA backend uses this same encoding.
pub fn encode_tx_lists(tx_lists: &[TxList]) -> io::Result<Bytes> {
    let mut out = Vec::new();
    alloy_rlp::encode_list::<_, TxList>(tx_lists, &mut out);
    zlib_compress(&out)
}

/// Decode a proposal payload produced by [`encode_tx_lists`].
pub fn decode_tx_lists(payload: &[u8]) -> Result<Vec<TxList>, PayloadDecodeError> {
    let raw = zlib_decompress(payload)?;
    Ok(Vec::<TxList>::decode(&mut raw.as_ref())?)
}
