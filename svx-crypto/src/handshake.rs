//! The 84-byte handshake payload (§3) and the three-DH key schedule (§4.3).
//!
//! This module only computes key material from already-exchanged public
//! values; the state machine driving *when* to send/accept a handshake
//! frame lives in `svx-stream`.

use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};
use crate::identity::StaticKeypair;
use crate::kdf::hkdf_expand;

pub const VERSION: u8 = 1;
pub const PAYLOAD_LEN: usize = 84;

pub const CAP_WILL_ENCRYPT_OUTBOUND: u8 = 0x01;
pub const CAP_REQUIRE_ENCRYPTED_INBOUND: u8 = 0x02;

const HKDF_SALT: &[u8] = b"NADEv1";
const HKDF_INFO: &[u8] = b"NADE_SESS";
const HKDF_OUT_LEN: usize = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client = 0,
    Server = 1,
}

impl Role {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn opposite(self) -> Role {
        match self {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }
}

/// The fixed 84-byte handshake payload (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakePayload {
    pub version: u8,
    pub role: u8,
    pub capabilities: u8,
    pub reserved: u8,
    pub ephemeral_pub: [u8; 32],
    pub static_pub: [u8; 32],
}

impl HandshakePayload {
    pub fn new(role: Role, capabilities: u8, ephemeral_pub: [u8; 32], static_pub: [u8; 32]) -> Self {
        Self {
            version: VERSION,
            role: role.as_u8(),
            capabilities,
            reserved: 0,
            ephemeral_pub,
            static_pub,
        }
    }

    pub fn encode(&self) -> [u8; PAYLOAD_LEN] {
        let mut buf = [0u8; PAYLOAD_LEN];
        buf[0] = self.version;
        buf[1] = self.role;
        buf[2] = self.capabilities;
        buf[3] = self.reserved;
        buf[4..36].copy_from_slice(&self.ephemeral_pub);
        buf[36..68].copy_from_slice(&self.static_pub);
        let digest = Sha256::digest(self.static_pub);
        buf[68..84].copy_from_slice(&digest[0..16]);
        buf
    }

    /// Decode and validate a wire-format handshake payload. Per the
    /// failure-semantics table, a bad version is an "ignore" outcome at
    /// the session layer, not a hard error here — the caller decides.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PAYLOAD_LEN {
            return Err(Error::protocol(format!(
                "handshake payload must be {PAYLOAD_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let version = bytes[0];
        let role = bytes[1];
        let capabilities = bytes[2];
        let reserved = bytes[3];
        let mut ephemeral_pub = [0u8; 32];
        ephemeral_pub.copy_from_slice(&bytes[4..36]);
        let mut static_pub = [0u8; 32];
        static_pub.copy_from_slice(&bytes[36..68]);
        let digest = Sha256::digest(static_pub);
        if digest[0..16] != bytes[68..84] {
            return Err(Error::protocol("handshake payload static-key digest mismatch"));
        }
        Ok(Self {
            version,
            role,
            capabilities,
            reserved,
            ephemeral_pub,
            static_pub,
        })
    }
}

/// The four values HKDF derives out of the three DH products (§4.3 table).
#[derive(ZeroizeOnDrop)]
pub struct TransportKeys {
    pub tx_key: [u8; 32],
    pub rx_key: [u8; 32],
    pub tx_nonce_base: [u8; 12],
    pub rx_nonce_base: [u8; 12],
}

/// Run the three-DH construction and HKDF key schedule for `role`, given
/// this side's static and ephemeral keypairs and the peer's public values
/// observed in its handshake payload.
///
/// Both client and server assemble `ikm = dh_ee || dh_eS || dh_sE` in this
/// fixed order regardless of role (§4.3), where `dh_eS` is the
/// client-ephemeral/server-static product and `dh_sE` is the
/// server-ephemeral/client-static product.
pub fn derive_transport_keys(
    role: Role,
    own_static: &StaticKeypair,
    own_ephemeral: &StaticKeypair,
    peer_static_pub: &[u8; 32],
    peer_ephemeral_pub: &[u8; 32],
) -> Result<TransportKeys> {
    let mut dh_ee = own_ephemeral.diffie_hellman(peer_ephemeral_pub);
    let (mut dh_es, mut dh_se) = match role {
        Role::Client => {
            // dh_eS: client ephemeral x server static.
            let es = own_ephemeral.diffie_hellman(peer_static_pub);
            // dh_sE: client static x server ephemeral.
            let se = own_static.diffie_hellman(peer_ephemeral_pub);
            (es, se)
        }
        Role::Server => {
            // dh_eS: client ephemeral x server static == server static x client ephemeral.
            let es = own_static.diffie_hellman(peer_ephemeral_pub);
            // dh_sE: server ephemeral x client static == client static x server ephemeral.
            let se = own_ephemeral.diffie_hellman(peer_static_pub);
            (es, se)
        }
    };

    let mut ikm = [0u8; 96];
    ikm[0..32].copy_from_slice(&dh_ee);
    ikm[32..64].copy_from_slice(&dh_es);
    ikm[64..96].copy_from_slice(&dh_se);

    let mut okm = [0u8; HKDF_OUT_LEN];
    let result = hkdf_expand(&ikm, HKDF_SALT, HKDF_INFO, &mut okm);

    dh_ee.zeroize();
    dh_es.zeroize();
    dh_se.zeroize();
    ikm.zeroize();

    result?;

    let mut client_key = [0u8; 32];
    let mut server_key = [0u8; 32];
    let mut client_nonce_base = [0u8; 12];
    let mut server_nonce_base = [0u8; 12];
    client_key.copy_from_slice(&okm[0..32]);
    server_key.copy_from_slice(&okm[32..64]);
    client_nonce_base.copy_from_slice(&okm[64..76]);
    server_nonce_base.copy_from_slice(&okm[76..88]);
    okm.zeroize();

    let keys = match role {
        Role::Client => TransportKeys {
            tx_key: client_key,
            rx_key: server_key,
            tx_nonce_base: client_nonce_base,
            rx_nonce_base: server_nonce_base,
        },
        Role::Server => TransportKeys {
            tx_key: server_key,
            rx_key: client_key,
            tx_nonce_base: server_nonce_base,
            rx_nonce_base: client_nonce_base,
        },
    };

    client_key.zeroize();
    server_key.zeroize();

    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips_through_wire_bytes() {
        let payload = HandshakePayload::new(Role::Client, CAP_WILL_ENCRYPT_OUTBOUND, [1u8; 32], [2u8; 32]);
        let wire = payload.encode();
        assert_eq!(wire.len(), PAYLOAD_LEN);
        let decoded = HandshakePayload::decode(&wire).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert!(HandshakePayload::decode(&[0u8; 83]).is_err());
        assert!(HandshakePayload::decode(&[0u8; 85]).is_err());
    }

    #[test]
    fn decode_rejects_tampered_digest() {
        let payload = HandshakePayload::new(Role::Server, 0, [3u8; 32], [4u8; 32]);
        let mut wire = payload.encode();
        wire[83] ^= 0xFF;
        assert!(HandshakePayload::decode(&wire).is_err());
    }

    #[test]
    fn handshake_pairing_satisfies_key_swap_property() {
        let client_static = StaticKeypair::from_seed([10u8; 32]);
        let server_static = StaticKeypair::from_seed([20u8; 32]);
        let client_eph = StaticKeypair::from_seed([11u8; 32]);
        let server_eph = StaticKeypair::from_seed([21u8; 32]);

        let client_keys = derive_transport_keys(
            Role::Client,
            &client_static,
            &client_eph,
            &server_static.public_bytes(),
            &server_eph.public_bytes(),
        )
        .unwrap();
        let server_keys = derive_transport_keys(
            Role::Server,
            &server_static,
            &server_eph,
            &client_static.public_bytes(),
            &client_eph.public_bytes(),
        )
        .unwrap();

        assert_eq!(client_keys.tx_key, server_keys.rx_key);
        assert_eq!(client_keys.rx_key, server_keys.tx_key);
        assert_eq!(client_keys.tx_nonce_base, server_keys.rx_nonce_base);
        assert_eq!(client_keys.rx_nonce_base, server_keys.tx_nonce_base);
    }

    #[test]
    fn same_keys_and_ephemerals_are_deterministic() {
        let a_static = StaticKeypair::from_seed([5u8; 32]);
        let b_static = StaticKeypair::from_seed([6u8; 32]);
        let a_eph = StaticKeypair::from_seed([7u8; 32]);
        let b_eph = StaticKeypair::from_seed([8u8; 32]);

        let k1 = derive_transport_keys(Role::Client, &a_static, &a_eph, &b_static.public_bytes(), &b_eph.public_bytes()).unwrap();
        let k2 = derive_transport_keys(Role::Client, &a_static, &a_eph, &b_static.public_bytes(), &b_eph.public_bytes()).unwrap();
        assert_eq!(k1.tx_key, k2.tx_key);
        assert_eq!(k1.rx_key, k2.rx_key);
    }
}
