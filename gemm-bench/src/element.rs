use half::f16;
use rand::Rng;
use std::fmt;

#[cfg(nvidia)]
pub trait DeviceType: cublas::GemmType {}
#[cfg(nvidia)]
impl<T: cublas::GemmType> DeviceType for T {}

#[cfg(not(nvidia))]
pub trait DeviceType {}
#[cfg(not(nvidia))]
impl<T> DeviceType for T {}

/// Floating-point types the benchmark multiplies.
pub trait Element: DeviceType + Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    const NAME: &'static str;

    fn zero() -> Self;
    fn from_f64(x: f64) -> Self;
    fn to_f64(self) -> f64;
    /// Uniform in `[0, 1)`.
    fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $name:literal) => {
        impl Element for $ty {
            const NAME: &'static str = $name;

            #[inline]
            fn zero() -> Self {
                0.
            }
            #[inline]
            fn from_f64(x: f64) -> Self {
                x as _
            }
            #[inline]
            fn to_f64(self) -> f64 {
                self as _
            }
            #[inline]
            fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
                rng.random()
            }
        }
    };
}

impl_element!(f32, "f32");
impl_element!(f64, "f64");

impl Element for f16 {
    const NAME: &'static str = "f16";

    #[inline]
    fn zero() -> Self {
        f16::ZERO
    }
    #[inline]
    fn from_f64(x: f64) -> Self {
        f16::from_f64(x)
    }
    #[inline]
    fn to_f64(self) -> f64 {
        self.to_f64()
    }
    #[inline]
    fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        // values close to 1 round up in half precision
        let x = f16::from_f32(rng.random::<f32>());
        if x < f16::ONE {
            x
        } else {
            f16::ONE - f16::EPSILON / f16::from_f32(2.)
        }
    }
}

/// Fills `data` with uniform random numbers from `[0, 1)`.
pub fn fill_rand<T: Element, R: Rng + ?Sized>(data: &mut [T], rng: &mut R) {
    data.iter_mut().for_each(|x| *x = T::sample(rng))
}

#[cfg(test)]
mod test {
    use super::{Element, fill_rand};
    use half::f16;
    use rand::{SeedableRng, rngs::StdRng};

    fn check_range<T: Element>() {
        let mut data = vec![T::zero(); 4096];
        fill_rand(&mut data, &mut rand::rng());
        assert!(data.iter().all(|x| (0. ..1.).contains(&x.to_f64())));
        // not all equal
        assert!(data.iter().any(|x| *x != data[0]));
    }

    #[test]
    fn test_range() {
        check_range::<f16>();
        check_range::<f32>();
        check_range::<f64>();
    }

    #[test]
    fn test_seeded() {
        let mut a = vec![0.0f32; 64];
        let mut b = vec![0.0f32; 64];
        fill_rand(&mut a, &mut StdRng::seed_from_u64(42));
        fill_rand(&mut b, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_half_below_one() {
        let below = f16::ONE - f16::EPSILON / f16::from_f32(2.);
        assert!(below < f16::ONE);
        assert!(below > f16::from_f32(0.999));
    }
}
