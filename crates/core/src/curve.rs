//! secp256k1 group arithmetic over arbitrary-precision integers.
//!
//! This is the algebra behind public-key recovery. Points are kept in
//! Jacobian coordinates while multiplying and converted back to affine form
//! with a single field inversion. Everything here is a pure function of its
//! inputs.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use std::sync::OnceLock;

const P_BYTES: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xfc, 0x2f,
];

const N_BYTES: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

const GX_BYTES: [u8; 32] = [
    0x79, 0xbe, 0x66, 0x7e, 0xf9, 0xdc, 0xbb, 0xac, 0x55, 0xa0, 0x62, 0x95, 0xce, 0x87, 0x0b, 0x07,
    0x02, 0x9b, 0xfc, 0xdb, 0x2d, 0xce, 0x28, 0xd9, 0x59, 0xf2, 0x81, 0x5b, 0x16, 0xf8, 0x17, 0x98,
];

const GY_BYTES: [u8; 32] = [
    0x48, 0x3a, 0xda, 0x77, 0x26, 0xa3, 0xc4, 0x65, 0x5d, 0xa4, 0xfb, 0xfc, 0x0e, 0x11, 0x08, 0xa8,
    0xfd, 0x17, 0xb4, 0x48, 0xa6, 0x85, 0x54, 0x19, 0x9c, 0x47, 0xd0, 0x8f, 0xfb, 0x10, 0xd4, 0xb8,
];

/// Curve constant `b` in `y^2 = x^3 + b` (`a` is zero).
const B: u32 = 7;

/// Domain parameters of secp256k1.
#[derive(Debug)]
pub struct Curve {
    /// Field prime.
    pub p: BigUint,
    /// Group order.
    pub n: BigUint,
    /// Generator.
    pub g: AffinePoint,
}

/// The secp256k1 parameters, built once.
pub fn secp256k1() -> &'static Curve {
    static CURVE: OnceLock<Curve> = OnceLock::new();
    CURVE.get_or_init(|| Curve {
        p: BigUint::from_bytes_be(&P_BYTES),
        n: BigUint::from_bytes_be(&N_BYTES),
        g: AffinePoint {
            x: BigUint::from_bytes_be(&GX_BYTES),
            y: BigUint::from_bytes_be(&GY_BYTES),
        },
    })
}

/// A finite curve point in affine coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffinePoint {
    pub x: BigUint,
    pub y: BigUint,
}

impl AffinePoint {
    /// Check `y^2 == x^3 + 7 (mod p)`.
    pub fn is_on_curve(&self) -> bool {
        let p = &secp256k1().p;
        if &self.x >= p || &self.y >= p {
            return false;
        }
        (&self.y * &self.y) % p == curve_rhs(&self.x)
    }

    /// Big-endian `x || y`, 32 bytes each.
    pub fn to_uncompressed_xy(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        write_be32(&self.x, &mut out[..32]);
        write_be32(&self.y, &mut out[32..]);
        out
    }
}

/// Write `value` as a left-padded 32-byte big-endian integer.
pub fn write_be32(value: &BigUint, out: &mut [u8]) {
    let bytes = value.to_bytes_be();
    let start = out.len().saturating_sub(bytes.len());
    let skip = bytes.len().saturating_sub(out.len());
    out[..start].fill(0);
    out[start..].copy_from_slice(&bytes[skip..]);
}

/// `x^3 + 7 mod p`.
fn curve_rhs(x: &BigUint) -> BigUint {
    let p = &secp256k1().p;
    (x * x % p * x + BigUint::from(B)) % p
}

fn sub_mod(a: &BigUint, b: &BigUint, m: &BigUint) -> BigUint {
    let b = b % m;
    ((a % m) + m - b) % m
}

/// Modular inverse for a prime modulus, via Fermat's little theorem.
///
/// Returns `None` for values congruent to zero.
pub fn inv_mod(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    let a = a % m;
    if a.is_zero() {
        return None;
    }
    let exponent = m - BigUint::from(2u32);
    Some(a.modpow(&exponent, m))
}

/// Square root modulo p (p ≡ 3 mod 4). `None` if `a` is not a residue.
pub fn sqrt_mod_p(a: &BigUint) -> Option<BigUint> {
    let p = &secp256k1().p;
    let exponent = (p + BigUint::one()) >> 2;
    let root = a.modpow(&exponent, p);
    if (&root * &root) % p == a % p {
        Some(root)
    } else {
        None
    }
}

/// Lift an x-coordinate to the curve point whose y parity is `odd`.
pub fn lift_x(x: &BigUint, odd: bool) -> Option<AffinePoint> {
    let p = &secp256k1().p;
    if x >= p {
        return None;
    }
    let beta = sqrt_mod_p(&curve_rhs(x))?;
    let y = if beta.bit(0) == odd {
        beta
    } else {
        (p - &beta) % p
    };
    Some(AffinePoint { x: x.clone(), y })
}

/// Jacobian point `(X, Y, Z)` representing `(X/Z^2, Y/Z^3)`; `Z = 0` is infinity.
#[derive(Debug, Clone)]
struct Jacobian {
    x: BigUint,
    y: BigUint,
    z: BigUint,
}

impl Jacobian {
    fn infinity() -> Self {
        Self {
            x: BigUint::one(),
            y: BigUint::one(),
            z: BigUint::zero(),
        }
    }

    fn from_affine(point: &AffinePoint) -> Self {
        Self {
            x: point.x.clone(),
            y: point.y.clone(),
            z: BigUint::one(),
        }
    }

    fn is_infinity(&self) -> bool {
        self.z.is_zero()
    }

    fn to_affine(&self) -> Option<AffinePoint> {
        let p = &secp256k1().p;
        let z_inv = inv_mod(&self.z, p)?;
        let z_inv2 = &z_inv * &z_inv % p;
        let z_inv3 = &z_inv2 * &z_inv % p;
        Some(AffinePoint {
            x: &self.x * &z_inv2 % p,
            y: &self.y * &z_inv3 % p,
        })
    }

    fn negate(&self) -> Self {
        let p = &secp256k1().p;
        Self {
            x: self.x.clone(),
            y: sub_mod(&BigUint::zero(), &self.y, p),
            z: self.z.clone(),
        }
    }

    fn double(&self) -> Self {
        let p = &secp256k1().p;
        if self.is_infinity() || self.y.is_zero() {
            return Self::infinity();
        }
        let y2 = &self.y * &self.y % p;
        let s = BigUint::from(4u32) * &self.x % p * &y2 % p;
        let m = BigUint::from(3u32) * &self.x % p * &self.x % p;
        let x3 = sub_mod(&(&m * &m % p), &(BigUint::from(2u32) * &s), p);
        let y4 = &y2 * &y2 % p;
        let y3 = sub_mod(
            &(&m * sub_mod(&s, &x3, p) % p),
            &(BigUint::from(8u32) * y4),
            p,
        );
        let z3 = BigUint::from(2u32) * &self.y % p * &self.z % p;
        Self { x: x3, y: y3, z: z3 }
    }

    fn add(&self, other: &Self) -> Self {
        let p = &secp256k1().p;
        if self.is_infinity() {
            return other.clone();
        }
        if other.is_infinity() {
            return self.clone();
        }
        let z1_2 = &self.z * &self.z % p;
        let z2_2 = &other.z * &other.z % p;
        let u1 = &self.x * &z2_2 % p;
        let u2 = &other.x * &z1_2 % p;
        let s1 = &self.y * &z2_2 % p * &other.z % p;
        let s2 = &other.y * &z1_2 % p * &self.z % p;

        if u1 == u2 {
            return if s1 == s2 {
                self.double()
            } else {
                Self::infinity()
            };
        }

        let h = sub_mod(&u2, &u1, p);
        let r = sub_mod(&s2, &s1, p);
        let h2 = &h * &h % p;
        let h3 = &h2 * &h % p;
        let u1h2 = &u1 * &h2 % p;
        let x3 = sub_mod(
            &sub_mod(&(&r * &r % p), &h3, p),
            &(BigUint::from(2u32) * &u1h2),
            p,
        );
        let y3 = sub_mod(&(&r * sub_mod(&u1h2, &x3, p) % p), &(&s1 * &h3), p);
        let z3 = &h * &self.z % p * &other.z % p;
        Self { x: x3, y: y3, z: z3 }
    }

    fn mul(&self, scalar: &BigUint) -> Self {
        let mut acc = Self::infinity();
        for i in (0..scalar.bits()).rev() {
            acc = acc.double();
            if scalar.bit(i) {
                acc = acc.add(self);
            }
        }
        acc
    }
}

/// `k · P`. `None` when the result is the point at infinity.
pub fn scalar_mul(point: &AffinePoint, scalar: &BigUint) -> Option<AffinePoint> {
    Jacobian::from_affine(point).mul(scalar).to_affine()
}

/// Recover the signer's public key from an ECDSA signature.
///
/// Computes `Q = r⁻¹ · (s·R − e·G)` where `R` is lifted from `r` with the y
/// parity named by `recovery_id`. Returns `None` when any scalar is out of
/// range, `r` does not lift to a curve point, or `Q` is the point at infinity.
pub fn recover_public_key(
    digest: &[u8; 32],
    r: &BigUint,
    s: &BigUint,
    recovery_id: u8,
) -> Option<AffinePoint> {
    let curve = secp256k1();
    if recovery_id > 1 {
        return None;
    }
    if r.is_zero() || s.is_zero() || r >= &curve.n || s >= &curve.n {
        return None;
    }

    let big_r = lift_x(r, recovery_id == 1)?;
    let e = BigUint::from_bytes_be(digest) % &curve.n;
    let r_inv = inv_mod(r, &curve.n)?;

    let s_r = Jacobian::from_affine(&big_r).mul(s);
    let e_g = Jacobian::from_affine(&curve.g).mul(&e);
    let q = s_r.add(&e_g.negate()).mul(&r_inv);
    if q.is_infinity() {
        return None;
    }
    q.to_affine()
}
