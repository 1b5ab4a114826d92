//! Password digests.
//!
//! Stored form: `argon2id$<m_cost>$<t_cost>$<p_cost>$<salt hex>$<key hex>`.
//! Verification uses the cost stored with the digest, not the current default.

use argon2::{Algorithm, Argon2, ParamsBuilder, Version};
use rand::RngCore;
use subtle::ConstantTimeEq;
use thiserror::Error;

const SCHEME: &str = "argon2id";
const M_COST_KIB: u32 = 19 * 1024;
const T_COST: u32 = 2;
const P_COST: u32 = 1;
const KEY_LEN: usize = 32;

#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct HashError(String);

#[derive(Debug, Clone, Copy)]
struct Cost {
    m: u32,
    t: u32,
    p: u32,
}

const DEFAULT_COST: Cost = Cost {
    m: M_COST_KIB,
    t: T_COST,
    p: P_COST,
};

pub fn hash(password: &str) -> Result<String, HashError> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let key = derive(password, &salt, DEFAULT_COST)?;
    Ok(format!(
        "{}${}${}${}${}${}",
        SCHEME,
        DEFAULT_COST.m,
        DEFAULT_COST.t,
        DEFAULT_COST.p,
        hex::encode(salt),
        hex::encode(key)
    ))
}

pub fn verify(password: &str, stored: &str) -> bool {
    let parts: Vec<&str> = stored.split('$').collect();
    let [SCHEME, m, t, p, salt, expected] = parts.as_slice() else {
        return false;
    };
    let (Ok(m), Ok(t), Ok(p)) = (m.parse::<u32>(), t.parse::<u32>(), p.parse::<u32>()) else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt), hex::decode(expected)) else {
        return false;
    };
    if expected.len() != KEY_LEN {
        return false;
    }
    match derive(password, &salt, Cost { m, t, p }) {
        Ok(actual) => actual.as_slice().ct_eq(expected.as_slice()).into(),
        Err(_) => false,
    }
}

fn derive(password: &str, salt: &[u8], cost: Cost) -> Result<[u8; KEY_LEN], HashError> {
    let params = ParamsBuilder::new()
        .m_cost(cost.m)
        .t_cost(cost.t)
        .p_cost(cost.p)
        .output_len(KEY_LEN)
        .build()
        .map_err(|e| HashError(format!("invalid argon2 parameters: {}", e)))?;
    let mut key = [0u8; KEY_LEN];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| HashError(e.to_string()))?;
    Ok(key)
}
