//! TON factory (wallet v4 R2).
//!
//! The payload is JSON `{message, seqno, expireAt?}` where `message` is
//! the base64 BoC of the relaxed internal message built by the chain SDK.
//! The factory wraps it in the wallet-v4 signing body (wallet id, valid
//! until, seqno, op, send mode, message ref), signs the body cell hash
//! with ed25519 and returns the signed external body as base64 BoC.
//! `expireAt` replaces the SDK's wall-clock default so identical inputs
//! always produce identical bytes.
//!
//! The address is the friendly non-bounceable form of the wallet-v4
//! StateInit hash (standard v4 R2 code, caller's public key, wallet id).

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD as BASE64_URL};
use base64::Engine as _;
use once_cell::sync::Lazy;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::info;

use super::codec::crc16_xmodem;
use crate::core::errors::SignerError;
use crate::core::network::Network;
use crate::core::options::WalletOptions;
use crate::core::wallet::{AdditionalAddresses, SigningWallet};
use crate::crypto::ed25519::Ed25519Key;
use crate::crypto::mnemonic::ton_key_seed;

const WALLET_ID: u32 = 698_983_191;
const SEND_MODE_PAY_GAS_SEPARATELY: u8 = 1;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const TAG_TEST_ONLY: u8 = 0x80;

/// Standard wallet v4 R2 code cell.
const WALLET_V4_R2_CODE: &str = "te6ccgECFAEAAtQAART/APSkE/S88sgLAQIBIAIDAgFIBAUE+PKDCNcYINMf0x/THwL4I7vyZO1E0NMf0x/T//QE0VFDuvKhUVG68qIF+QFUEGT5EPKj+AAkpMjLH1JAyx9SMMv/UhD0AMntVPgPAdMHIcAAn2xRkyDXSpbTB9QC+wDoMOAhwAHjACHAAuMAAcADkTDjDQOkyMsfEssfy/8QERITAubQAdDTAyFxsJJfBOAi10nBIJJfBOAC0x8hghBwbHVnvSKCEGRzdHK9sJJfBeAD+kAwIPpEAcjKB8v/ydDtRNCBAUDXIfQEMFyBAQj0Cm+hMbOSXwfgBdM/yCWCEHBsdWe6kjgw4w0DghBkc3RyupJfBuMNBgcCASAICQB4AfoA9AQw+CdvIjBQCqEhvvLgUIIQcGx1Z4MesXCAGFAEywUmzxZY+gIZ9ADLaRfLH1Jgyz8gyYBA+wAGAIpQBIEBCPRZMO1E0IEBQNcgyAHPFvQAye1UAXKwjiOCEGRzdHKDHrFwgBhQBcsFUAPPFiP6AhPLassfyz/JgED7AJJfA+ICASAKCwBZvSQrb2omhAgKBrkPoCGEcNQICEekk30pkQzmkD6f+YN4EoAbeBAUiYcVnzGEAgFYDA0AEbjJftRNDXCx+AA9sp37UTQgQFA1yH0BDACyMoHy//J0AGBAQj0Cm+hMYAIBIA4PABmtznaiaEAga5Drhf/AABmvHfaiaEAQa5DrhY/AAG7SB/oA1NQi+QAFyMoHFcv/ydB3dIAYyMsFywIizxZQBfoCFMtrEszMyXP7AMhAFIEBCPRR8qcCAHCBAQjXGPoA0z/IVCBHgQEI9FHyp4IQbm90ZXB0gBjIywXLAlAGzxZQBPoCFMtqEssfyz/Jc/sAAgBsgQEI1xj6ANM/MFIkgQEI9Fnyp4IQZHN0cnB0gBjIywXLAlAFzxZQA/oCE8tqyx8Syz/Jc/sAAAr0AMntVA==";

// --- cells -----------------------------------------------------------------

/// An ordinary cell: up to 1023 data bits plus references.
struct Cell {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Arc<Cell>>,
}

impl Cell {
    fn byte_len(&self) -> usize {
        (self.bit_len + 7) / 8
    }

    /// Data with the completion tag applied to a partial last byte.
    fn padded_data(&self) -> Vec<u8> {
        let mut bytes = self.data[..self.byte_len()].to_vec();
        if self.bit_len % 8 != 0 {
            bytes[self.bit_len / 8] |= 0x80 >> (self.bit_len % 8);
        }
        bytes
    }

    fn d1(&self) -> u8 {
        self.refs.len() as u8
    }

    fn d2(&self) -> u8 {
        (self.bit_len / 8 + self.byte_len()) as u8
    }

    fn depth(&self) -> u16 {
        self.refs
            .iter()
            .map(|r| r.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Standard representation hash.
    fn repr_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update([self.d1(), self.d2()]);
        hasher.update(self.padded_data());
        for r in &self.refs {
            hasher.update(r.depth().to_be_bytes());
        }
        for r in &self.refs {
            hasher.update(r.repr_hash());
        }
        hasher.finalize().into()
    }
}

#[derive(Default)]
struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Arc<Cell>>,
}

impl CellBuilder {
    fn store_bit(&mut self, bit: bool) {
        if self.bit_len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            self.data[self.bit_len / 8] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    fn store_uint(&mut self, value: u64, bits: usize) {
        for i in (0..bits).rev() {
            self.store_bit((value >> i) & 1 == 1);
        }
    }

    fn store_bits(&mut self, bytes: &[u8], bit_len: usize) {
        for i in 0..bit_len {
            self.store_bit(bytes[i / 8] & (0x80 >> (i % 8)) != 0);
        }
    }

    fn store_ref(&mut self, cell: Arc<Cell>) {
        self.refs.push(cell);
    }

    fn build(self) -> Arc<Cell> {
        Arc::new(Cell {
            data: self.data,
            bit_len: self.bit_len,
            refs: self.refs,
        })
    }
}

// --- bag of cells ----------------------------------------------------------

const BOC_MAGIC: [u8; 4] = [0xB5, 0xEE, 0x9C, 0x72];

fn read_be(bytes: &[u8], cursor: &mut usize, width: usize) -> Result<usize, String> {
    let slice = bytes
        .get(*cursor..*cursor + width)
        .ok_or("truncated bag of cells")?;
    *cursor += width;
    Ok(slice.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize))
}

fn parse_boc(bytes: &[u8]) -> Result<Arc<Cell>, String> {
    if bytes.len() < 11 || bytes[..4] != BOC_MAGIC {
        return Err("bad bag-of-cells magic".to_string());
    }
    let flags = bytes[4];
    let has_idx = flags & 0x80 != 0;
    let has_crc = flags & 0x40 != 0;
    let size = (flags & 0x07) as usize;
    let off_bytes = bytes[5] as usize;
    if size == 0 || size > 4 || off_bytes == 0 || off_bytes > 8 {
        return Err("bad bag-of-cells header widths".to_string());
    }

    let mut cursor = 6;
    let cells_count = read_be(bytes, &mut cursor, size)?;
    let roots_count = read_be(bytes, &mut cursor, size)?;
    let _absent = read_be(bytes, &mut cursor, size)?;
    let _total_size = read_be(bytes, &mut cursor, off_bytes)?;
    if roots_count != 1 {
        return Err(format!("expected one root, found {roots_count}"));
    }
    let root_index = read_be(bytes, &mut cursor, size)?;
    if has_idx {
        cursor += cells_count * off_bytes;
    }

    struct RawCell {
        data: Vec<u8>,
        bit_len: usize,
        refs: Vec<usize>,
    }

    let mut raw_cells = Vec::with_capacity(cells_count);
    for _ in 0..cells_count {
        let d1 = read_be(bytes, &mut cursor, 1)?;
        if d1 & 0x08 != 0 {
            return Err("exotic cells are not supported".to_string());
        }
        let refs_count = d1 & 0x07;
        let d2 = read_be(bytes, &mut cursor, 1)?;
        let data_len = (d2 + 1) / 2;
        let data = bytes
            .get(cursor..cursor + data_len)
            .ok_or("truncated cell data")?
            .to_vec();
        cursor += data_len;

        let bit_len = if d2 % 2 == 1 {
            let last = *data.last().ok_or("empty partial cell")?;
            if last == 0 {
                return Err("missing completion tag".to_string());
            }
            data_len * 8 - (last.trailing_zeros() as usize + 1)
        } else {
            data_len * 8
        };

        let mut refs = Vec::with_capacity(refs_count);
        for _ in 0..refs_count {
            refs.push(read_be(bytes, &mut cursor, size)?);
        }
        raw_cells.push(RawCell {
            data,
            bit_len,
            refs,
        });
    }
    if has_crc {
        // trailing crc32c, not verified here
    }

    // References always point to higher indices; build back-to-front.
    let mut built: Vec<Option<Arc<Cell>>> = vec![None; cells_count];
    for index in (0..cells_count).rev() {
        let raw = &raw_cells[index];
        let mut refs = Vec::with_capacity(raw.refs.len());
        for r in &raw.refs {
            if *r <= index {
                return Err("non-topological cell reference".to_string());
            }
            refs.push(
                built
                    .get(*r)
                    .and_then(|c| c.clone())
                    .ok_or("dangling cell reference")?,
            );
        }
        built[index] = Some(Arc::new(Cell {
            data: raw.data.clone(),
            bit_len: raw.bit_len,
            refs,
        }));
    }

    built
        .get(root_index)
        .and_then(|c| c.clone())
        .ok_or_else(|| "root index out of range".to_string())
}

fn serialize_boc(root: &Arc<Cell>) -> Vec<u8> {
    // Pre-order walk with dedup; our trees share nothing upward, so
    // references always point forward.
    fn walk(cell: &Arc<Cell>, seen: &mut Vec<Arc<Cell>>, index: &mut Vec<[u8; 32]>) {
        let hash = cell.repr_hash();
        if index.contains(&hash) {
            return;
        }
        index.push(hash);
        seen.push(cell.clone());
        for r in &cell.refs {
            walk(r, seen, index);
        }
    }

    let mut cells = Vec::new();
    let mut hashes = Vec::new();
    walk(root, &mut cells, &mut hashes);

    let position = |cell: &Arc<Cell>| {
        let hash = cell.repr_hash();
        hashes.iter().position(|h| *h == hash).expect("indexed cell")
    };

    let size: usize = if cells.len() > 255 { 2 } else { 1 };
    let mut body = Vec::new();
    for cell in &cells {
        body.push(cell.d1());
        body.push(cell.d2());
        body.extend_from_slice(&cell.padded_data());
        for r in &cell.refs {
            let idx = position(r);
            if size == 2 {
                body.extend_from_slice(&(idx as u16).to_be_bytes());
            } else {
                body.push(idx as u8);
            }
        }
    }

    let off_bytes: usize = 2;
    let mut out = Vec::with_capacity(body.len() + 16);
    out.extend_from_slice(&BOC_MAGIC);
    out.push(size as u8); // no idx, no crc, no cache bits
    out.push(off_bytes as u8);
    let write = |out: &mut Vec<u8>, value: usize, width: usize| {
        for i in (0..width).rev() {
            out.push((value >> (8 * i)) as u8);
        }
    };
    write(&mut out, cells.len(), size); // cells
    write(&mut out, 1, size); // roots
    write(&mut out, 0, size); // absent
    write(&mut out, body.len(), off_bytes);
    write(&mut out, 0, size); // root index
    out.extend_from_slice(&body);
    out
}

static WALLET_CODE: Lazy<Result<Arc<Cell>, String>> = Lazy::new(|| {
    let bytes = BASE64
        .decode(WALLET_V4_R2_CODE)
        .map_err(|e| format!("wallet code base64: {e}"))?;
    parse_boc(&bytes)
});

/// StateInit hash of the v4 wallet holding `public_key`.
fn wallet_account_id(public_key: &[u8; 32]) -> Result<[u8; 32], SignerError> {
    let code = WALLET_CODE
        .as_ref()
        .map_err(|e| SignerError::KeyDerivation(format!("wallet code cell: {e}")))?
        .clone();

    let mut data = CellBuilder::default();
    data.store_uint(0, 32); // seqno
    data.store_uint(WALLET_ID as u64, 32);
    data.store_bits(public_key, 256);
    data.store_bit(false); // empty plugin dictionary
    let data = data.build();

    // StateInit: no split depth, no special, code ref, data ref, no library.
    let mut state_init = CellBuilder::default();
    state_init.store_bit(false);
    state_init.store_bit(false);
    state_init.store_bit(true);
    state_init.store_bit(true);
    state_init.store_bit(false);
    state_init.store_ref(code);
    state_init.store_ref(data);
    Ok(state_init.build().repr_hash())
}

fn friendly_address(account_id: &[u8; 32], test_only: bool) -> String {
    let mut tag = TAG_NON_BOUNCEABLE;
    if test_only {
        tag |= TAG_TEST_ONLY;
    }
    let mut bytes = Vec::with_capacity(36);
    bytes.push(tag);
    bytes.push(0x00); // workchain 0
    bytes.extend_from_slice(account_id);
    let crc = crc16_xmodem(&bytes);
    bytes.extend_from_slice(&crc.to_be_bytes());
    BASE64_URL.encode(bytes)
}

// --- factory ---------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferPayload {
    /// base64 BoC of the relaxed internal message.
    message: String,
    seqno: u32,
    /// Deterministic replacement for the SDK's now-plus-timeout default.
    #[serde(default)]
    expire_at: Option<u32>,
}

struct TonWallet {
    network: Network,
    key: Ed25519Key,
    test_only: bool,
}

#[async_trait]
impl SigningWallet for TonWallet {
    async fn address(&self) -> Result<String, SignerError> {
        let account_id = wallet_account_id(&self.key.public_key_bytes())?;
        Ok(friendly_address(&account_id, self.test_only))
    }

    async fn additional_addresses(&self) -> Result<AdditionalAddresses, SignerError> {
        Ok(AdditionalAddresses::new())
    }

    async fn sign_transaction(&self, raw: &str) -> Result<String, SignerError> {
        let payload: TransferPayload = serde_json::from_str(raw)
            .map_err(|e| SignerError::payload(self.network, format!("transfer json: {e}")))?;

        let message_bytes = BASE64
            .decode(&payload.message)
            .map_err(|e| SignerError::payload(self.network, format!("message base64: {e}")))?;
        let message = parse_boc(&message_bytes)
            .map_err(|e| SignerError::payload(self.network, format!("message cells: {e}")))?;

        let mut body = CellBuilder::default();
        body.store_uint(WALLET_ID as u64, 32);
        if payload.seqno == 0 {
            // First transfer: valid-until is all ones.
            body.store_uint(u32::MAX as u64, 32);
        } else {
            body.store_uint(payload.expire_at.unwrap_or(u32::MAX) as u64, 32);
        }
        body.store_uint(payload.seqno as u64, 32);
        body.store_uint(0, 8); // simple order
        body.store_uint(SEND_MODE_PAY_GAS_SEPARATELY as u64, 8);
        body.store_ref(message);
        let body = body.build();

        let signature = self.key.sign(&body.repr_hash());

        let mut signed = CellBuilder::default();
        signed.store_bits(&signature, 512);
        signed.store_bits(&body.data, body.bit_len);
        for r in &body.refs {
            signed.store_ref(r.clone());
        }
        let signed = signed.build();

        Ok(BASE64.encode(serialize_boc(&signed)))
    }
}

pub(crate) async fn signing_wallet(
    network: Network,
    options: WalletOptions,
) -> Result<Box<dyn SigningWallet>, SignerError> {
    info!(network = %network, "building TON signing wallet");
    let opts = options.require_mnemonic(network)?;
    let seed = ton_key_seed(&opts.mnemonic, "")?;
    Ok(Box::new(TonWallet {
        network,
        key: Ed25519Key::from_seed_bytes(&seed),
        test_only: network == Network::TonTestnet,
    }))
}
