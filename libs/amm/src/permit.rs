//! Signed approvals
//!
//! A permit lets `owner` approve `spender` with an off-chain signature over a
//! typed-data digest. The digest binds the token name, the chain id and the
//! token address, and includes the owner's current nonce, so a signature is
//! valid for exactly one token on one chain, once.
//!
//! Signature recovery sits behind [`SignatureVerifier`]; the engine ships an
//! ECDSA implementation and tests may swap in their own.

use ethers::abi::{self, Token};
use ethers::types::{Address, Signature, H256, U256};
use ethers::utils::keccak256;
use pairdex_config::protocol::permit::{DOMAIN_TYPE, DOMAIN_VERSION, PERMIT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chain::Chain;
use crate::errors::{AmmError, AmmResult};

/// `(v, r, s)` signature components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitSignature {
    pub v: u8,
    pub r: H256,
    pub s: H256,
}

impl From<Signature> for PermitSignature {
    fn from(signature: Signature) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        signature.r.to_big_endian(&mut r);
        signature.s.to_big_endian(&mut s);
        Self {
            v: signature.v as u8,
            r: H256(r),
            s: H256(s),
        }
    }
}

/// Recovers the signer of a digest
pub trait SignatureVerifier {
    fn recover(&self, digest: H256, signature: &PermitSignature) -> AmmResult<Address>;
}

/// secp256k1 public key recovery
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaVerifier;

impl SignatureVerifier for EcdsaVerifier {
    fn recover(&self, digest: H256, signature: &PermitSignature) -> AmmResult<Address> {
        let signature = Signature {
            r: U256::from_big_endian(signature.r.as_bytes()),
            s: U256::from_big_endian(signature.s.as_bytes()),
            v: u64::from(signature.v),
        };
        signature
            .recover(digest)
            .map_err(|_| AmmError::InvalidSignature)
    }
}

/// Domain separator of a token deployed at `verifying_contract`
pub fn domain_separator(name: &str, chain_id: u64, verifying_contract: Address) -> H256 {
    H256(keccak256(abi::encode(&[
        Token::FixedBytes(keccak256(DOMAIN_TYPE).to_vec()),
        Token::FixedBytes(keccak256(name).to_vec()),
        Token::FixedBytes(keccak256(DOMAIN_VERSION).to_vec()),
        Token::Uint(U256::from(chain_id)),
        Token::Address(verifying_contract),
    ])))
}

/// Typed-data digest the owner signs
pub fn permit_digest(
    domain_separator: H256,
    owner: Address,
    spender: Address,
    value: U256,
    nonce: U256,
    deadline: U256,
) -> H256 {
    let struct_hash = keccak256(abi::encode(&[
        Token::FixedBytes(keccak256(PERMIT_TYPE).to_vec()),
        Token::Address(owner),
        Token::Address(spender),
        Token::Uint(value),
        Token::Uint(nonce),
        Token::Uint(deadline),
    ]));

    let mut message = Vec::with_capacity(66);
    message.extend_from_slice(&[0x19, 0x01]);
    message.extend_from_slice(domain_separator.as_bytes());
    message.extend_from_slice(&struct_hash);
    H256(keccak256(message))
}

impl Chain {
    pub fn domain_separator(&self, token: Address) -> AmmResult<H256> {
        let name = &self.token(token)?.name;
        Ok(domain_separator(name, self.chain_id(), token))
    }

    /// Digest `owner` must sign to approve `spender` with their next nonce
    pub fn permit_digest(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        value: U256,
        deadline: U256,
    ) -> AmmResult<H256> {
        Ok(permit_digest(
            self.domain_separator(token)?,
            owner,
            spender,
            value,
            self.nonce(token, owner),
            deadline,
        ))
    }

    /// Approve `spender` on behalf of `owner` using a signature instead of a call from `owner`
    pub fn permit(
        &mut self,
        token: Address,
        owner: Address,
        spender: Address,
        value: U256,
        deadline: U256,
        signature: &PermitSignature,
    ) -> AmmResult<()> {
        self.transact(|chain| {
            if deadline < U256::from(chain.timestamp()) {
                return Err(AmmError::PermitExpired);
            }
            let digest = chain.permit_digest(token, owner, spender, value, deadline)?;
            let recovered = chain.verifier().recover(digest, signature)?;
            if recovered.is_zero() || recovered != owner {
                return Err(AmmError::InvalidSignature);
            }

            let nonce = chain.use_nonce(token, owner)?;
            chain.approve(token, owner, spender, value)?;
            debug!(?token, ?owner, ?spender, %nonce, "Permit accepted");
            Ok(())
        })
    }
}
