use num::Float;

/// Dot product of two dense vectors
///
/// # Arguments
/// * `a` - left vector
/// * `b` - right vector, same length as `a`
#[inline]
pub fn dot<N: Float>(a: &[N], b: &[N]) -> N {
    debug_assert_eq!(
        a.len(),
        b.len(),
        "Vectors must be of the same length to compute dot product."
    );
    a.iter().zip(b).fold(N::zero(), |acc, (&x, &y)| acc + x * y)
}

#[inline]
pub fn norm_sq<N: Float>(a: &[N]) -> N {
    a.iter().fold(N::zero(), |acc, &x| acc + x * x)
}

/// Scale `a` to unit L2 norm in place.
/// An all-zero vector stays all-zero.
#[inline]
pub fn l2_normalize<N: Float>(a: &mut [N]) {
    let norm = norm_sq(a).sqrt();
    if norm > N::zero() {
        for v in a.iter_mut() {
            *v = *v / norm;
        }
    }
}

/// Cosine similarity, zero when either side has zero norm.
#[inline]
pub fn cosine<N: Float>(a: &[N], b: &[N]) -> N {
    let denom = norm_sq(a).sqrt() * norm_sq(b).sqrt();
    if denom > N::zero() {
        dot(a, b) / denom
    } else {
        N::zero()
    }
}

/// Add `src` into `acc` element-wise.
#[inline]
pub fn add_assign<N: Float>(acc: &mut [N], src: &[N]) {
    for (a, &s) in acc.iter_mut().zip(src) {
        *a = *a + s;
    }
}
