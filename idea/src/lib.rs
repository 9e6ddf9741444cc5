//! IDEA block cipher: key schedule, single-block encrypt/decrypt.
//!
//! Block size is 8 bytes (four big-endian `u16` words), key size is 16
//! bytes. The cipher combines three group operations on 16-bit words:
//! addition mod 2^16, XOR, and multiplication mod 65537 (with the value
//! `0` standing in for `2^16`, the classic trick that lets the
//! otherwise-excluded zero residue participate in the multiplicative
//! group of the prime 65537).
//!
//! This primitive is read-only once constructed (`Idea::new` derives
//! both subkey schedules up front), so an `Idea` instance is freely
//! shareable across threads.

use byteorder::{BigEndian, ByteOrder};

const ROUNDS: usize = 8;
const SCHEDULE_LEN: usize = 52;

/// Multiplication modulo 65537, with `0` reinterpreted as `2^16`.
fn mul(a: u16, b: u16) -> u16 {
    if a != 0 && b != 0 {
        let t = (a as u32) * (b as u32);
        let hi = (t >> 16) as u16;
        let lo = (t & 0xFFFF) as u16;
        lo.wrapping_sub(hi).wrapping_add(if lo < hi { 1 } else { 0 })
    } else {
        1u16.wrapping_sub(a).wrapping_sub(b)
    }
}

/// Multiplicative inverse modulo 65537 via the extended-Euclidean
/// recurrence specialized to that prime. `0` and `1` are fixed points.
fn mul_inv(a: u16) -> u16 {
    if a <= 1 {
        return a;
    }

    let mut x = a;
    let mut y = (65537u32 % x as u32) as u16;
    let mut t1 = (65537u32 / x as u32) as u16;
    if y == 1 {
        return 1u16.wrapping_sub(t1);
    }

    let mut t0: u16 = 1;
    loop {
        let q = x / y;
        x %= y;
        t0 = t0.wrapping_add(q.wrapping_mul(t1));
        if x == 1 {
            return t0;
        }
        let q2 = y / x;
        y %= x;
        t1 = t1.wrapping_add(q2.wrapping_mul(t0));
        if y == 1 {
            return 1u16.wrapping_sub(t1);
        }
    }
}

/// Round-key schedule used by one direction (encryption or decryption).
/// Each of the 52 words is a subkey consumed by exactly one operation in
/// exactly one of the 8 rounds or the final output transformation.
type Schedule = [u16; SCHEDULE_LEN];

fn expand_ek(key: [u8; 16]) -> Schedule {
    let mut ek = [0u16; SCHEDULE_LEN];
    for (j, word) in ek.iter_mut().take(8).enumerate() {
        *word = BigEndian::read_u16(&key[2 * j..2 * j + 2]);
    }

    // Each new word is formed by rotating a 32-bit window of the previous
    // 8-word block left by 9 bits; the source block advances by 8 words
    // every 8 words generated. The indexing below reproduces the original
    // key schedule exactly, including its slightly unusual index walk.
    let (mut j, mut k, mut offset) = (1usize, 8usize, 0usize);
    while k != SCHEDULE_LEN {
        ek[j + 7 + offset] =
            (ek[(j % 8) + offset] << 9) | (ek[((j + 1) % 8) + offset] >> 7);
        offset += if j == 8 { 8 } else { 0 };
        j %= 8;
        j += 1;
        k += 1;
    }
    ek
}

fn invert(ek: &Schedule) -> Schedule {
    let mut dk = [0u16; SCHEDULE_LEN];

    dk[51] = mul_inv(ek[3]);
    dk[50] = ek[2].wrapping_neg();
    dk[49] = ek[1].wrapping_neg();
    dk[48] = mul_inv(ek[0]);

    let (mut j, mut k, mut counter) = (1usize, 4usize, 47usize);
    while j != 8 {
        dk[counter] = ek[k + 1];
        counter -= 1;
        dk[counter] = ek[k];
        counter -= 1;
        dk[counter] = mul_inv(ek[k + 5]);
        counter -= 1;
        dk[counter] = ek[k + 3].wrapping_neg();
        counter -= 1;
        dk[counter] = ek[k + 4].wrapping_neg();
        counter -= 1;
        dk[counter] = mul_inv(ek[k + 2]);
        counter -= 1;
        j += 1;
        k += 6;
    }

    dk[5] = ek[47];
    dk[4] = ek[46];
    dk[3] = mul_inv(ek[51]);
    dk[2] = ek[50].wrapping_neg();
    dk[1] = ek[49].wrapping_neg();
    dk[0] = mul_inv(ek[48]);
    dk
}

fn transform(block: [u8; 8], k: &Schedule) -> [u8; 8] {
    let mut x1 = BigEndian::read_u16(&block[0..2]);
    let mut x2 = BigEndian::read_u16(&block[2..4]);
    let mut x3 = BigEndian::read_u16(&block[4..6]);
    let mut x4 = BigEndian::read_u16(&block[6..8]);

    for j in 0..ROUNDS {
        let k = &k[6 * j..6 * j + 6];
        x1 = mul(x1, k[0]);
        x2 = x2.wrapping_add(k[1]);
        x3 = x3.wrapping_add(k[2]);
        x4 = mul(x4, k[3]);

        let t0 = x3;
        x3 ^= x1;
        x3 = mul(x3, k[4]);
        let t1 = x2;
        x2 = (x2 ^ x4).wrapping_add(x3);
        x2 = mul(x2, k[5]);

        x3 = x3.wrapping_add(x2);
        x1 ^= x2;
        x4 ^= x3;
        x2 ^= t0;
        x3 ^= t1;
    }

    x1 = mul(x1, k[48]);
    x2 = x2.wrapping_add(k[50]);
    x3 = x3.wrapping_add(k[49]);
    x4 = mul(x4, k[51]);

    let mut out = [0u8; 8];
    BigEndian::write_u16(&mut out[0..2], x1);
    BigEndian::write_u16(&mut out[2..4], x3);
    BigEndian::write_u16(&mut out[4..6], x2);
    BigEndian::write_u16(&mut out[6..8], x4);
    out
}

/// A key-scheduled IDEA instance. Construction derives both the
/// encryption and decryption subkey schedules; they are immutable for
/// the lifetime of the value.
#[derive(Clone)]
pub struct Idea {
    ek: Schedule,
    dk: Schedule,
}

impl Idea {
    /// Runs the key schedule over a 128-bit key.
    pub fn new(key: [u8; 16]) -> Self {
        let ek = expand_ek(key);
        let dk = invert(&ek);
        Idea { ek, dk }
    }

    /// Encrypts a single 64-bit block.
    pub fn encrypt_block(&self, block: [u8; 8]) -> [u8; 8] {
        transform(block, &self.ek)
    }

    /// Decrypts a single 64-bit block.
    pub fn decrypt_block(&self, block: [u8; 8]) -> [u8; 8] {
        transform(block, &self.dk)
    }
}
